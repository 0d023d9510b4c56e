//! Background engine.
//!
//! A single periodic task that expires stale pending reservations, draws
//! due auto-draw competitions, and trims the rate limiter's bookkeeping.

pub mod allocation;
pub mod draw;

pub use allocation::{allocate, AllocationError};
pub use draw::{draw_winner, DrawError, DrawOutcome};

use anyhow::Result;
use std::sync::Arc;
use tokio::time::{interval, Duration};

use crate::api::rate_limit::RateLimiter;
use crate::config::Config;
use crate::db::{Competition, CompetitionStatus};
use crate::notifications::email::SystemEmailService;
use crate::DbPool;

pub struct Engine {
    db: DbPool,
    config: Config,
    email: Arc<SystemEmailService>,
    rate_limiter: Arc<RateLimiter>,
}

impl Engine {
    pub fn new(
        db: DbPool,
        config: Config,
        email: Arc<SystemEmailService>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            db,
            config,
            email,
            rate_limiter,
        }
    }

    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(self.config.engine.sweep_interval));
        tracing::info!(
            interval_secs = self.config.engine.sweep_interval,
            "Background engine started"
        );

        loop {
            ticker.tick().await;

            if let Err(e) = self.sweep_expired_reservations().await {
                tracing::warn!(error = %e, "Reservation sweep failed");
            }

            if let Err(e) = self.auto_draw_pass().await {
                tracing::warn!(error = %e, "Auto-draw pass failed");
            }

            self.rate_limiter.cleanup_expired();
        }
    }

    /// Mark overdue pending reservations as failed, returning their ticket
    /// numbers to the free pool.
    pub async fn sweep_expired_reservations(&self) -> Result<u64> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE orders SET payment_status = 'failed' WHERE payment_status = 'pending' AND expires_at <= ?",
        )
        .bind(&now)
        .execute(&self.db)
        .await?;

        let expired = result.rows_affected();
        if expired > 0 {
            tracing::info!(expired, "Expired pending reservations");
        }
        Ok(expired)
    }

    /// Draw every due auto-draw competition that has sold tickets.
    pub async fn auto_draw_pass(&self) -> Result<()> {
        let candidates: Vec<Competition> = sqlx::query_as(
            "SELECT * FROM competitions WHERE auto_draw = 1 AND winner_id IS NULL AND tickets_sold > 0",
        )
        .fetch_all(&self.db)
        .await?;

        let now = chrono::Utc::now();
        for comp in candidates {
            // Due means the draw date has passed; status_at handles the parse
            if comp.status_at(now) != CompetitionStatus::Completed {
                continue;
            }

            match draw::draw_winner(&self.db, &comp.id).await {
                Ok(outcome) => {
                    tracing::info!(
                        competition = %comp.id,
                        title = %comp.title,
                        "Auto-drew winner"
                    );
                    self.notify_winner(outcome);
                }
                // Lost a race with a manual draw or sales; skip quietly
                Err(DrawError::AlreadyDrawn) | Err(DrawError::NoEntries) => {}
                Err(e) => {
                    tracing::warn!(competition = %comp.id, error = %e, "Auto-draw failed");
                }
            }
        }

        Ok(())
    }

    /// Send the winner notification without blocking the sweep.
    pub fn notify_winner(&self, outcome: DrawOutcome) {
        let Some(to) = outcome.winner_email else {
            return;
        };
        let email = self.email.clone();
        let winner = outcome.winner;
        tokio::spawn(async move {
            if let Err(e) = email.send_winner_email(&to, &winner).await {
                tracing::warn!(error = %e, "Failed to send winner email");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn engine_with_db() -> (Engine, DbPool) {
        let db = crate::db::init_in_memory().await.unwrap();
        let config = Config::default();
        let email = Arc::new(SystemEmailService::new(config.email.clone()));
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let engine = Engine::new(db.clone(), config, email, rate_limiter);
        (engine, db)
    }

    async fn seed_user_and_competition(db: &DbPool, draw_date: &str, auto_draw: i64) {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, full_name, role, email_verified, created_at, updated_at)
            VALUES ('u1', 'u1@example.com', '', 'Entrant', 'user', 0, ?, ?)
            "#,
        )
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await
        .unwrap();

        sqlx::query(
            r#"
            INSERT INTO competitions (id, title, description, category, prize_value, ticket_price,
                                      total_tickets, tickets_sold, draw_date, auto_draw, created_at)
            VALUES ('comp-1', 'Test', 'Test', 'cash', 100.0, 1.0, 10, 2, ?, ?, ?)
            "#,
        )
        .bind(draw_date)
        .bind(auto_draw)
        .bind(&now)
        .execute(db)
        .await
        .unwrap();
    }

    async fn insert_order(db: &DbPool, id: &str, status: &str, expires_at: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, competition_id, competition_title, ticket_numbers,
                                quantity, total_price, payment_status, expires_at, created_at)
            VALUES (?, 'u1', 'comp-1', 'Test', '[1,2]', 2, 2.0, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(expires_at)
        .bind(&now)
        .execute(db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_expires_only_overdue_pending() {
        let (engine, db) = engine_with_db().await;
        seed_user_and_competition(&db, "2099-01-01T00:00:00+00:00", 0).await;

        insert_order(&db, "late", "pending", "2000-01-01T00:00:00+00:00").await;
        insert_order(&db, "fresh", "pending", "2099-01-01T00:00:00+00:00").await;
        insert_order(&db, "done", "completed", "2000-01-01T00:00:00+00:00").await;

        let expired = engine.sweep_expired_reservations().await.unwrap();
        assert_eq!(expired, 1);

        let (status,): (String,) =
            sqlx::query_as("SELECT payment_status FROM orders WHERE id = 'late'")
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(status, "failed");

        let (status,): (String,) =
            sqlx::query_as("SELECT payment_status FROM orders WHERE id = 'fresh'")
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(status, "pending");

        let (status,): (String,) =
            sqlx::query_as("SELECT payment_status FROM orders WHERE id = 'done'")
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(status, "completed");
    }

    #[tokio::test]
    async fn test_auto_draw_draws_due_competition() {
        let (engine, db) = engine_with_db().await;
        seed_user_and_competition(&db, "2000-01-01T00:00:00+00:00", 1).await;
        insert_order(&db, "o1", "completed", "2099-01-01T00:00:00+00:00").await;

        engine.auto_draw_pass().await.unwrap();

        let (winner_id,): (Option<String>,) =
            sqlx::query_as("SELECT winner_id FROM competitions WHERE id = 'comp-1'")
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(winner_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn test_auto_draw_skips_undue_competition() {
        let (engine, db) = engine_with_db().await;
        // Future draw date: not due yet
        seed_user_and_competition(&db, "2099-01-01T00:00:00+00:00", 1).await;
        insert_order(&db, "o1", "completed", "2099-01-01T00:00:00+00:00").await;

        engine.auto_draw_pass().await.unwrap();

        let (winner_id,): (Option<String>,) =
            sqlx::query_as("SELECT winner_id FROM competitions WHERE id = 'comp-1'")
                .fetch_one(&db)
                .await
                .unwrap();
        assert!(winner_id.is_none());
    }
}
