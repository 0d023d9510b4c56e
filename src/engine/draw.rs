//! Winner selection.
//!
//! Every ticket number on a completed order is one entry; the draw picks one
//! entry uniformly at random with the OS-seeded CSPRNG, records the winner
//! on the competition and inserts a winner row, all in one transaction.

use rand::seq::IndexedRandom;
use thiserror::Error;

use crate::db::{Competition, DbPool, Winner};

#[derive(Debug, Error)]
pub enum DrawError {
    #[error("Competition not found")]
    NotFound,
    #[error("Winner already drawn")]
    AlreadyDrawn,
    #[error("No tickets sold yet")]
    NoEntries,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Result of a draw, with the winner's email for notification.
#[derive(Debug)]
pub struct DrawOutcome {
    pub winner: Winner,
    pub winner_email: Option<String>,
}

pub async fn draw_winner(db: &DbPool, competition_id: &str) -> Result<DrawOutcome, DrawError> {
    let mut tx = db.begin().await?;

    let comp: Option<Competition> =
        sqlx::query_as("SELECT * FROM competitions WHERE id = ?")
            .bind(competition_id)
            .fetch_optional(&mut *tx)
            .await?;
    let comp = comp.ok_or(DrawError::NotFound)?;

    if comp.winner_id.is_some() {
        return Err(DrawError::AlreadyDrawn);
    }

    let orders: Vec<(String, String)> = sqlx::query_as(
        "SELECT user_id, ticket_numbers FROM orders WHERE competition_id = ? AND payment_status = 'completed'",
    )
    .bind(competition_id)
    .fetch_all(&mut *tx)
    .await?;

    let mut entries: Vec<(&str, i64)> = Vec::new();
    for (user_id, numbers) in &orders {
        let tickets: Vec<i64> = serde_json::from_str(numbers).unwrap_or_default();
        for ticket in tickets {
            entries.push((user_id, ticket));
        }
    }

    if entries.is_empty() {
        return Err(DrawError::NoEntries);
    }

    let Some(&(winner_user_id, winning_ticket)) = entries.choose(&mut rand::rng()) else {
        return Err(DrawError::NoEntries);
    };

    let winner_user: Option<(String, String)> =
        sqlx::query_as("SELECT full_name, email FROM users WHERE id = ?")
            .bind(winner_user_id)
            .fetch_optional(&mut *tx)
            .await?;
    let (user_name, winner_email) = match winner_user {
        Some((name, email)) => (name, Some(email)),
        None => ("Anonymous".to_string(), None),
    };

    sqlx::query("UPDATE competitions SET winner_id = ?, winner_ticket = ? WHERE id = ?")
        .bind(winner_user_id)
        .bind(winning_ticket)
        .bind(competition_id)
        .execute(&mut *tx)
        .await?;

    let winner = Winner {
        id: uuid::Uuid::new_v4().to_string(),
        competition_id: competition_id.to_string(),
        competition_title: comp.title.clone(),
        user_id: winner_user_id.to_string(),
        user_name,
        winning_ticket,
        prize_value: comp.prize_value,
        drawn_at: chrono::Utc::now().to_rfc3339(),
    };

    sqlx::query(
        r#"
        INSERT INTO winners (id, competition_id, competition_title, user_id, user_name,
                             winning_ticket, prize_value, drawn_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&winner.id)
    .bind(&winner.competition_id)
    .bind(&winner.competition_title)
    .bind(&winner.user_id)
    .bind(&winner.user_name)
    .bind(winner.winning_ticket)
    .bind(winner.prize_value)
    .bind(&winner.drawn_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        competition = %competition_id,
        winner = %winner.user_id,
        ticket = winner.winning_ticket,
        "Winner drawn"
    );

    Ok(DrawOutcome {
        winner,
        winner_email,
    })
}
