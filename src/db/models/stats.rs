//! Admin dashboard counters.

use serde::Serialize;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Serialize)]
pub struct AdminStats {
    pub total_users: i64,
    pub total_competitions: i64,
    pub active_competitions: i64,
    pub total_orders: i64,
    pub total_revenue: f64,
    pub tickets_sold_today: i64,
}

impl AdminStats {
    pub async fn collect(db: &SqlitePool) -> Result<Self, sqlx::Error> {
        let (total_users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await?;

        let (total_competitions,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM competitions")
            .fetch_one(db)
            .await?;

        let (active_competitions,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM competitions WHERE is_visible = 1")
                .fetch_one(db)
                .await?;

        let (total_orders,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM orders WHERE payment_status = 'completed'")
                .fetch_one(db)
                .await?;

        let (total_revenue,): (Option<f64>,) = sqlx::query_as(
            "SELECT SUM(total_price) FROM orders WHERE payment_status = 'completed'",
        )
        .fetch_one(db)
        .await?;

        // RFC 3339 timestamps sort lexicographically, so a string prefix
        // comparison against midnight UTC is enough.
        let today_start = format!("{}T00:00:00", chrono::Utc::now().format("%Y-%m-%d"));

        let (tickets_sold_today,): (Option<i64>,) = sqlx::query_as(
            "SELECT SUM(quantity) FROM orders WHERE payment_status = 'completed' AND created_at >= ?",
        )
        .bind(&today_start)
        .fetch_one(db)
        .await?;

        Ok(Self {
            total_users,
            total_competitions,
            active_competitions,
            total_orders,
            total_revenue: total_revenue.unwrap_or(0.0),
            tickets_sold_today: tickets_sold_today.unwrap_or(0),
        })
    }
}
