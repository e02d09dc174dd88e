use crate::{errors::ServiceError, ApiResponse, PaginationMeta};
use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;
use validator::Validate;

/// 200 with data
pub fn success_response<T: Serialize>(message: &str, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(message, data))
}

/// 201 with data
pub fn created_response<T: Serialize>(
    message: &str,
    data: T,
) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(message, data)))
}

/// 200 carrying only a message
pub fn message_response(message: &str) -> Json<ApiResponse<()>> {
    Json(ApiResponse::message(message))
}

pub fn paginated_response<T: Serialize>(
    message: &str,
    data: T,
    pagination: PaginationMeta,
) -> Json<ApiResponse<T>> {
    Json(ApiResponse::paginated(message, data, pagination))
}

/// Runs `validator` rules, turning failures into a 400.
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input.validate().map_err(|errors| {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{}: invalid value", field),
                })
            })
            .collect();
        if messages.is_empty() {
            messages.push(errors.to_string());
        }
        messages.sort();
        ServiceError::ValidationError(messages.join(", "))
    })
}

/// `?page=&limit=` with defaults of 1 and 10
#[derive(Debug, Clone, Copy, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    10
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PaginationParams {
    /// Defaults for values a query left out
    pub fn resolve(page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or_else(default_page),
            limit: limit.unwrap_or_else(default_limit),
        }
    }

    pub fn page(&self) -> u64 {
        self.page.max(1)
    }

    pub fn limit(&self) -> u64 {
        self.limit.clamp(1, 100)
    }

    pub fn meta(&self, total: u64) -> PaginationMeta {
        PaginationMeta::new(self.page(), self.limit(), total)
    }
}
