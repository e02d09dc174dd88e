/// Common types and utilities shared across handlers and services
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::errors::ServiceError;

/// Optional `YYYY-MM-DD` bounds for filtering queries
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRangeParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl DateRangeParams {
    /// Start of `from` and end of `to`, both inclusive, in UTC.
    pub fn to_datetime_range(
        &self,
    ) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), ServiceError> {
        let parse = |raw: &str, label: &str| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
                ServiceError::ValidationError(format!("Invalid {} date format: {}", label, e))
            })
        };

        let from = match self.from.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => parse(raw, "start")?
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc()),
            None => None,
        };
        let to = match self.to.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => parse(raw, "end")?
                .and_hms_opt(23, 59, 59)
                .map(|dt| dt.and_utc()),
            None => None,
        };

        Ok((from, to))
    }
}

/// Rounds a monetary amount to cents.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}

/// `price × (1 − discount_percent / 100)`, rounded to cents.
pub fn discounted_price(price: Decimal, discount_percent: Decimal) -> Decimal {
    let factor = Decimal::ONE - discount_percent / Decimal::ONE_HUNDRED;
    round_money(price * factor)
}

/// Lowercase slug with runs of non-alphanumerics collapsed to `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for ch in input.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn discount_formula_rounds_to_cents() {
        assert_eq!(discounted_price(dec!(100), dec!(0)), dec!(100));
        assert_eq!(discounted_price(dec!(100), dec!(15)), dec!(85));
        assert_eq!(discounted_price(dec!(19.99), dec!(33)), dec!(13.39));
        assert_eq!(discounted_price(dec!(50), dec!(100)), dec!(0));
    }

    #[test]
    fn slugs_collapse_separators() {
        assert_eq!(slugify("  Men's Running  Shoe!! "), "men-s-running-shoe");
        assert_eq!(slugify("T-Shirt / Blue"), "t-shirt-blue");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn date_range_is_inclusive() {
        let range = DateRangeParams {
            from: Some("2024-03-01".into()),
            to: Some("2024-03-02".into()),
        };
        let (from, to) = range.to_datetime_range().unwrap();
        assert_eq!(from.unwrap().to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(to.unwrap().to_rfc3339(), "2024-03-02T23:59:59+00:00");

        let bad = DateRangeParams {
            from: Some("03/01/2024".into()),
            to: None,
        };
        assert!(bad.to_datetime_range().is_err());
    }
}
