//! Ticket-number allocation.
//!
//! A number is "held" when it belongs to a completed order or to a pending
//! reservation that has not yet expired. Allocation samples uniformly from
//! the remaining free pool, so the union of held numbers can never exceed a
//! competition's inventory and no number is ever held twice, provided the
//! caller runs `allocate` inside the same transaction that inserts the
//! order row.

use rand::seq::index;
use sqlx::SqliteConnection;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("only {available} tickets available")]
    Insufficient { available: i64 },
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Collect the ticket numbers currently held against a competition.
pub async fn held_numbers(
    conn: &mut SqliteConnection,
    competition_id: &str,
    now: &str,
) -> Result<HashSet<i64>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT ticket_numbers FROM orders
        WHERE competition_id = ?
          AND (payment_status = 'completed'
               OR (payment_status = 'pending' AND expires_at > ?))
        "#,
    )
    .bind(competition_id)
    .bind(now)
    .fetch_all(&mut *conn)
    .await?;

    let mut held = HashSet::new();
    for (json,) in rows {
        let numbers: Vec<i64> = serde_json::from_str(&json).unwrap_or_default();
        held.extend(numbers);
    }
    Ok(held)
}

/// Sample `quantity` distinct numbers from [1, total] that are not held.
pub fn sample_free_numbers(
    total: i64,
    held: &HashSet<i64>,
    quantity: i64,
) -> Result<Vec<i64>, AllocationError> {
    let free: Vec<i64> = (1..=total).filter(|n| !held.contains(n)).collect();
    if (free.len() as i64) < quantity {
        return Err(AllocationError::Insufficient {
            available: free.len() as i64,
        });
    }

    let mut rng = rand::rng();
    let picked = index::sample(&mut rng, free.len(), quantity as usize);
    let mut numbers: Vec<i64> = picked.into_iter().map(|i| free[i]).collect();
    numbers.sort_unstable();
    Ok(numbers)
}

/// Allocate `quantity` ticket numbers for a competition.
///
/// Must be called on the transaction that inserts the resulting order.
pub async fn allocate(
    conn: &mut SqliteConnection,
    competition_id: &str,
    total_tickets: i64,
    quantity: i64,
    now: &str,
) -> Result<Vec<i64>, AllocationError> {
    let held = held_numbers(conn, competition_id, now).await?;
    sample_free_numbers(total_tickets, &held, quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_distinct_and_in_range() {
        let held = HashSet::new();
        let numbers = sample_free_numbers(100, &held, 10).unwrap();
        assert_eq!(numbers.len(), 10);

        let unique: HashSet<_> = numbers.iter().collect();
        assert_eq!(unique.len(), 10);
        assert!(numbers.iter().all(|&n| (1..=100).contains(&n)));

        // sorted output
        let mut sorted = numbers.clone();
        sorted.sort_unstable();
        assert_eq!(numbers, sorted);
    }

    #[test]
    fn test_sample_excludes_held() {
        let held: HashSet<i64> = (1..=90).collect();
        let numbers = sample_free_numbers(100, &held, 10).unwrap();
        assert_eq!(numbers, (91..=100).collect::<Vec<_>>());
    }

    #[test]
    fn test_sample_insufficient() {
        let held: HashSet<i64> = (1..=95).collect();
        let err = sample_free_numbers(100, &held, 10).unwrap_err();
        match err {
            AllocationError::Insufficient { available } => assert_eq!(available, 5),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sample_exact_remainder() {
        let held: HashSet<i64> = (1..=95).collect();
        let numbers = sample_free_numbers(100, &held, 5).unwrap();
        assert_eq!(numbers, vec![96, 97, 98, 99, 100]);
    }

    #[tokio::test]
    async fn test_held_numbers_respects_status_and_expiry() {
        let db = crate::db::init_in_memory().await.unwrap();
        seed_competition(&db, "comp-1", 100).await;

        let future = "2099-01-01T00:00:00+00:00";
        let past = "2000-01-01T00:00:00+00:00";

        insert_order(&db, "o1", "comp-1", "[1,2,3]", "completed", future).await;
        insert_order(&db, "o2", "comp-1", "[4,5]", "pending", future).await;
        insert_order(&db, "o3", "comp-1", "[6,7]", "pending", past).await; // expired
        insert_order(&db, "o4", "comp-1", "[8]", "refunded", future).await;
        insert_order(&db, "o5", "comp-1", "[9]", "failed", future).await;

        let now = chrono::Utc::now().to_rfc3339();
        let mut conn = db.acquire().await.unwrap();
        let held = held_numbers(&mut conn, "comp-1", &now).await.unwrap();

        assert_eq!(held, HashSet::from([1, 2, 3, 4, 5]));
    }

    async fn seed_competition(db: &crate::DbPool, id: &str, total: i64) {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO competitions (id, title, description, category, prize_value, ticket_price,
                                      total_tickets, tickets_sold, draw_date, created_at)
            VALUES (?, 'Test', 'Test', 'cash', 1000.0, 1.0, ?, 0, '2099-01-01T00:00:00Z', ?)
            "#,
        )
        .bind(id)
        .bind(total)
        .bind(&now)
        .execute(db)
        .await
        .unwrap();
    }

    async fn insert_order(
        db: &crate::DbPool,
        id: &str,
        competition_id: &str,
        numbers: &str,
        status: &str,
        expires_at: &str,
    ) {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, full_name, role, email_verified, created_at, updated_at)
            VALUES (?, ?, '', 'Buyer', 'user', 0, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(format!("user-{id}"))
        .bind(format!("{id}@example.com"))
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await
        .unwrap();

        let quantity = serde_json::from_str::<Vec<i64>>(numbers).unwrap().len() as i64;
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, competition_id, competition_title, ticket_numbers,
                                quantity, total_price, payment_status, expires_at, created_at)
            VALUES (?, ?, ?, 'Test', ?, ?, 0.0, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(format!("user-{id}"))
        .bind(competition_id)
        .bind(numbers)
        .bind(quantity)
        .bind(status)
        .bind(expires_at)
        .bind(&now)
        .execute(db)
        .await
        .unwrap();
    }
}
