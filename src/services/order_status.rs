use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait, TransactionTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::order::{self, OrderStatus, PaymentStatus},
    errors::ServiceError,
};

/// Requested lifecycle step
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OrderAction {
    Place,
    Confirm,
    Ship,
    Deliver,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{}", transition_message(.action, .current))]
pub struct TransitionError {
    pub action: OrderAction,
    pub current: OrderStatus,
}

fn transition_message(action: &OrderAction, current: &OrderStatus) -> String {
    match action {
        OrderAction::Place => format!("Cannot place an order that is already {}", current),
        OrderAction::Confirm => format!("Cannot confirm an order that is already {}", current),
        OrderAction::Ship => format!("Cannot ship an order that is already {}", current),
        OrderAction::Deliver => format!("Cannot mark as delivered. Current status: {}", current),
        OrderAction::Cancel => format!("Order cannot be cancelled, current status: {}", current),
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        ServiceError::BadRequest(err.to_string())
    }
}

/// The order state machine. Returns the status `action` leads to from `current`.
pub fn transition(current: OrderStatus, action: OrderAction) -> Result<OrderStatus, TransitionError> {
    use OrderStatus::*;

    let (allowed, target) = match action {
        OrderAction::Place => (current == Pending, Placed),
        OrderAction::Confirm => (!matches!(current, Confirmed | Delivered | Cancelled), Confirmed),
        OrderAction::Ship => (!matches!(current, Shipped | Delivered | Cancelled), Shipped),
        OrderAction::Deliver => (!matches!(current, Delivered | Cancelled), Delivered),
        OrderAction::Cancel => (!matches!(current, Cancelled | Delivered), Cancelled),
    };

    if allowed {
        Ok(target)
    } else {
        Err(TransitionError { action, current })
    }
}

/// Payment completion signal that moves a pending order to PLACED
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct PaymentConfirmation {
    #[validate(length(min = 1, max = 50))]
    pub payment_method: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub transaction_id: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub payment_id: Option<String>,
}

#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Applies `action` to an order. With `owner` set, orders belonging to
    /// anyone else are reported as missing.
    #[instrument(skip(self, payment))]
    pub async fn apply(
        &self,
        order_id: Uuid,
        action: OrderAction,
        owner: Option<Uuid>,
        payment: Option<PaymentConfirmation>,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .filter(|o| owner.map_or(true, |user_id| o.user_id == user_id))
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let previous = order.status;
        let next = transition(previous, action).map_err(|e| {
            warn!(order_id = %order_id, from = %previous, action = %action, "rejected status change");
            e
        })?;

        let now = Utc::now();
        let mut active: order::ActiveModel = order.into();
        active.status = Set(next);
        active.updated_at = Set(now);
        match action {
            OrderAction::Deliver => active.delivery_date = Set(Some(now)),
            OrderAction::Place => {
                let payment = payment.unwrap_or_default();
                active.payment_status = Set(PaymentStatus::Completed);
                active.payment_method = Set(payment.payment_method);
                active.transaction_id = Set(payment.transaction_id);
                active.payment_id = Set(payment.payment_id);
            }
            _ => {}
        }
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(order_id = %order_id, from = %previous, to = %next, "order status updated");
        Ok(updated)
    }

    pub async fn place(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        payment: PaymentConfirmation,
    ) -> Result<order::Model, ServiceError> {
        self.apply(order_id, OrderAction::Place, Some(user_id), Some(payment))
            .await
    }

    pub async fn confirm(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        self.apply(order_id, OrderAction::Confirm, None, None).await
    }

    pub async fn ship(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        self.apply(order_id, OrderAction::Ship, None, None).await
    }

    pub async fn deliver(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        self.apply(order_id, OrderAction::Deliver, None, None).await
    }

    /// Cancels an order. Customers pass their id and may only cancel their own.
    pub async fn cancel(
        &self,
        order_id: Uuid,
        owner: Option<Uuid>,
    ) -> Result<order::Model, ServiceError> {
        self.apply(order_id, OrderAction::Cancel, owner, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use OrderStatus::*;

    #[rstest]
    #[case(Pending, OrderAction::Place, Some(Placed))]
    #[case(Placed, OrderAction::Place, None)]
    #[case(Pending, OrderAction::Confirm, Some(Confirmed))]
    #[case(Placed, OrderAction::Confirm, Some(Confirmed))]
    #[case(Shipped, OrderAction::Confirm, Some(Confirmed))]
    #[case(Confirmed, OrderAction::Confirm, None)]
    #[case(Confirmed, OrderAction::Ship, Some(Shipped))]
    #[case(Shipped, OrderAction::Ship, None)]
    #[case(Shipped, OrderAction::Deliver, Some(Delivered))]
    #[case(Pending, OrderAction::Deliver, Some(Delivered))]
    #[case(Cancelled, OrderAction::Deliver, None)]
    #[case(Pending, OrderAction::Cancel, Some(Cancelled))]
    #[case(Placed, OrderAction::Cancel, Some(Cancelled))]
    #[case(Confirmed, OrderAction::Cancel, Some(Cancelled))]
    #[case(Shipped, OrderAction::Cancel, Some(Cancelled))]
    #[case(Delivered, OrderAction::Cancel, None)]
    #[case(Cancelled, OrderAction::Cancel, None)]
    fn transition_table(
        #[case] current: OrderStatus,
        #[case] action: OrderAction,
        #[case] expected: Option<OrderStatus>,
    ) {
        assert_eq!(transition(current, action).ok(), expected);
    }

    #[rstest]
    fn delivered_is_terminal(
        #[values(
            OrderAction::Place,
            OrderAction::Confirm,
            OrderAction::Ship,
            OrderAction::Deliver,
            OrderAction::Cancel
        )]
        action: OrderAction,
    ) {
        assert!(transition(Delivered, action).is_err());
    }

    #[test]
    fn rejection_messages_name_the_current_status() {
        let err = transition(Delivered, OrderAction::Cancel).unwrap_err();
        assert_eq!(err.to_string(), "Order cannot be cancelled, current status: DELIVERED");

        let err = transition(Confirmed, OrderAction::Confirm).unwrap_err();
        assert_eq!(err.to_string(), "Cannot confirm an order that is already CONFIRMED");

        let err = transition(Cancelled, OrderAction::Deliver).unwrap_err();
        assert_eq!(err.to_string(), "Cannot mark as delivered. Current status: CANCELLED");

        let service_err: ServiceError = transition(Shipped, OrderAction::Ship).unwrap_err().into();
        assert_eq!(service_err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
