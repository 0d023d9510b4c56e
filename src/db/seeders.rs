//! Demo-data seeding for evaluation installs.
//!
//! Idempotent: seeding is skipped as soon as any competition exists.

use anyhow::Result;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tracing::info;

/// Seed sample competitions, FAQ entries and past winners.
///
/// Returns false without touching anything when data already exists.
pub async fn seed_demo_data(pool: &SqlitePool) -> Result<bool> {
    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM competitions")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(false);
    }

    info!("Seeding demo data...");

    let now = Utc::now();
    let created_at = now.to_rfc3339();

    // (title, description, category, prize_value, ticket_price, total, sold, draw_in_days, featured)
    let competitions: Vec<(&str, &str, &str, f64, f64, i64, i64, i64, bool)> = vec![
        (
            "Mercedes AMG GT 63",
            "Win this stunning Mercedes AMG GT 63 S E Performance with 831bhp! The ultimate \
             hybrid hypercar combines luxury with raw power.",
            "cars",
            175_000.0,
            4.99,
            4999,
            0,
            14,
            true,
        ),
        (
            "BMW M4 Competition",
            "Take home this beast! BMW M4 Competition with 503bhp twin-turbo inline-six, \
             finished in Brooklyn Grey with the M Carbon Exterior Package.",
            "cars",
            85_000.0,
            2.99,
            3999,
            0,
            7,
            true,
        ),
        (
            "Audi RS6 Avant",
            "The ultimate super-estate! Audi RS6 Avant with 621bhp from its twin-turbo V8, \
             in Nardo Grey with the black optic package.",
            "cars",
            115_000.0,
            3.49,
            2999,
            0,
            21,
            false,
        ),
        (
            "iPhone Pro Max Bundle",
            "Win the latest iPhone Pro Max 1TB plus an accessories bundle worth over £300.",
            "electronics",
            2_000.0,
            0.99,
            999,
            0,
            3,
            true,
        ),
        (
            "Gaming Console Bundle",
            "Ultimate gaming setup with 2TB storage, an extra controller and ten top-rated games.",
            "electronics",
            1_500.0,
            0.79,
            1499,
            0,
            10,
            false,
        ),
        (
            "£10,000 Cash Prize",
            "Tax-free cash straight to your bank! Win £10,000 to spend however you like.",
            "cash",
            10_000.0,
            1.99,
            2499,
            0,
            5,
            true,
        ),
    ];

    for (title, description, category, prize_value, ticket_price, total, sold, days, featured) in
        competitions
    {
        sqlx::query(
            r#"
            INSERT INTO competitions (id, title, description, category, prize_value, ticket_price,
                                      total_tickets, tickets_sold, draw_date, image_url, featured,
                                      auto_draw, is_visible, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, '', ?, 1, 1, ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(title)
        .bind(description)
        .bind(category)
        .bind(prize_value)
        .bind(ticket_price)
        .bind(total)
        .bind(sold)
        .bind((now + Duration::days(days)).to_rfc3339())
        .bind(featured as i64)
        .bind(&created_at)
        .execute(pool)
        .await?;
    }

    let faq = serde_json::json!([
        {
            "question": "How do I enter a competition?",
            "answer": "Browse the competitions, choose how many tickets you want, and complete \
                       the secure checkout. Your ticket numbers are confirmed instantly."
        },
        {
            "question": "How are winners selected?",
            "answer": "Winners are selected with a cryptographically secure random number \
                       generator when the competition ends. All draws are conducted fairly."
        },
        {
            "question": "When will I receive my prize?",
            "answer": "Once confirmed as a winner, we aim to arrange prize delivery within 14 \
                       working days."
        },
        {
            "question": "Can I get a refund?",
            "answer": "Tickets are non-refundable once purchased, as set out in our terms and \
                       conditions."
        }
    ]);

    sqlx::query("INSERT INTO content (kind, body, updated_at) VALUES ('faq', ?, ?)")
        .bind(faq.to_string())
        .bind(&created_at)
        .execute(pool)
        .await?;

    // A couple of historic winners so the public list is not empty
    let past_winners: Vec<(&str, &str, i64, f64, i64)> = vec![
        ("Range Rover Sport SVR", "James T.", 1847, 95_000.0, 30),
        ("£25,000 Cash", "Sarah M.", 456, 25_000.0, 15),
    ];

    for (title, user_name, ticket, prize_value, days_ago) in past_winners {
        sqlx::query(
            r#"
            INSERT INTO winners (id, competition_id, competition_title, user_id, user_name,
                                 winning_ticket, prize_value, drawn_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(format!("comp-archive-{ticket}"))
        .bind(title)
        .bind(format!("user-archive-{ticket}"))
        .bind(user_name)
        .bind(ticket)
        .bind(prize_value)
        .bind((now - Duration::days(days_ago)).to_rfc3339())
        .execute(pool)
        .await?;
    }

    info!("Demo data seeded");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let db = crate::db::init_in_memory().await.unwrap();

        assert!(seed_demo_data(&db).await.unwrap());
        assert!(!seed_demo_data(&db).await.unwrap());

        let (competitions,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM competitions")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(competitions, 6);

        let (winners,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM winners")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(winners, 2);

        let (faq,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM content WHERE kind = 'faq'")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(faq, 1);
    }
}
