use crate::{
    entities::{
        cart,
        order::{self, OrderStatus},
        user,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Rolling seven-day windows ending today
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindows {
    pub this_week_start: DateTime<Utc>,
    pub this_week_end: DateTime<Utc>,
    pub last_week_start: DateTime<Utc>,
    pub last_week_end: DateTime<Utc>,
}

impl WeekWindows {
    pub fn ending_on(now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        let this_week_end = today.and_time(end_of_day).and_utc();
        let this_week_start = (today - Duration::days(6)).and_time(NaiveTime::MIN).and_utc();
        let last_week_start = this_week_start - Duration::days(7);
        let last_week_end = this_week_start - Duration::milliseconds(1);
        Self {
            this_week_start,
            this_week_end,
            last_week_start,
            last_week_end,
        }
    }
}

/// `1234 -> "1.2k"`, `2_500_000 -> "2.5M"`
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}k", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Signed week-over-week change, e.g. `"+12.5%"`.
pub fn calc_progress(current: u64, previous: u64) -> String {
    match (current, previous) {
        (0, 0) => "0%".to_string(),
        (_, 0) => "+100%".to_string(),
        _ => {
            let change = (current as f64 - previous as f64) / previous as f64 * 100.0;
            let sign = if change >= 0.0 { "+" } else { "" };
            format!("{}{:.1}%", sign, change)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub all_orders: u64,
    pub all_orders_last_week: u64,
    pub pending_orders: u64,
    pub delivered_orders: u64,
    pub abandoned_carts_this_week: u64,
    pub abandoned_carts_last_week: u64,
    pub customers_this_week: u64,
    pub customers_last_week: u64,
    pub in_progress_orders: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardMetric {
    pub title: &'static str,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardCard {
    pub title: &'static str,
    pub progress: String,
    pub metrics: Vec<DashboardMetric>,
}

impl DashboardStats {
    pub fn cards(&self) -> Vec<DashboardCard> {
        let metric = |title, n| DashboardMetric {
            title,
            number: format_count(n),
        };
        vec![
            DashboardCard {
                title: "Orders",
                progress: calc_progress(self.all_orders, self.all_orders_last_week),
                metrics: vec![
                    metric("All Orders", self.all_orders),
                    metric("Pending Orders", self.pending_orders),
                    metric("Completed Orders", self.delivered_orders),
                ],
            },
            DashboardCard {
                title: "Customers",
                progress: calc_progress(
                    self.abandoned_carts_this_week,
                    self.abandoned_carts_last_week,
                ),
                metrics: vec![
                    metric("Abandoned Cart", self.abandoned_carts_this_week),
                    metric("Customers", self.customers_this_week),
                    metric("In Progress", self.in_progress_orders),
                ],
            },
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardOverview {
    pub stats: DashboardStats,
    pub cards: Vec<DashboardCard>,
}

#[derive(Clone)]
pub struct DashboardService {
    db: Arc<DatabaseConnection>,
}

impl DashboardService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn abandoned_carts(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        Ok(cart::Entity::find()
            .filter(cart::Column::TotalItem.gt(0))
            .filter(cart::Column::UpdatedAt.between(from, to))
            .count(&*self.db)
            .await?)
    }

    async fn new_customers(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::CreatedAt.between(from, to))
            .count(&*self.db)
            .await?)
    }

    async fn orders_with(&self, statuses: &[OrderStatus]) -> Result<u64, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::Status.is_in(statuses.iter().copied()))
            .count(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn overview(&self) -> Result<DashboardOverview, ServiceError> {
        let w = WeekWindows::ending_on(Utc::now());
        let db = &*self.db;

        let (all_orders, all_orders_last_week, pending, delivered, in_progress) = tokio::try_join!(
            async { Ok::<_, ServiceError>(order::Entity::find().count(db).await?) },
            async {
                Ok::<_, ServiceError>(
                    order::Entity::find()
                        .filter(order::Column::CreatedAt.between(w.last_week_start, w.last_week_end))
                        .count(db)
                        .await?,
                )
            },
            self.orders_with(&[OrderStatus::Pending]),
            self.orders_with(&[OrderStatus::Delivered]),
            self.orders_with(&[OrderStatus::Placed, OrderStatus::Confirmed, OrderStatus::Shipped]),
        )?;
        let (carts_now, carts_before, customers_now, customers_before) = tokio::try_join!(
            self.abandoned_carts(w.this_week_start, w.this_week_end),
            self.abandoned_carts(w.last_week_start, w.last_week_end),
            self.new_customers(w.this_week_start, w.this_week_end),
            self.new_customers(w.last_week_start, w.last_week_end),
        )?;

        let stats = DashboardStats {
            all_orders,
            all_orders_last_week,
            pending_orders: pending,
            delivered_orders: delivered,
            abandoned_carts_this_week: carts_now,
            abandoned_carts_last_week: carts_before,
            customers_this_week: customers_now,
            customers_last_week: customers_before,
            in_progress_orders: in_progress,
        };
        Ok(DashboardOverview {
            cards: stats.cards(),
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0")]
    #[case(999, "999")]
    #[case(1_000, "1.0k")]
    #[case(1_260, "1.3k")]
    #[case(2_500_000, "2.5M")]
    fn counts_are_abbreviated(#[case] n: u64, #[case] expected: &str) {
        assert_eq!(format_count(n), expected);
    }

    #[rstest]
    #[case(0, 0, "0%")]
    #[case(5, 0, "+100%")]
    #[case(15, 10, "+50.0%")]
    #[case(5, 10, "-50.0%")]
    #[case(10, 10, "+0.0%")]
    fn progress_is_signed_percentage(#[case] current: u64, #[case] previous: u64, #[case] expected: &str) {
        assert_eq!(calc_progress(current, previous), expected);
    }

    #[test]
    fn windows_cover_two_adjacent_weeks() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap();
        let w = WeekWindows::ending_on(now);
        assert_eq!(w.this_week_start, Utc.with_ymd_and_hms(2026, 3, 8, 0, 0, 0).unwrap());
        assert_eq!(w.last_week_start, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        assert!(w.last_week_end < w.this_week_start);
        assert!(w.this_week_end > now);
    }
}
