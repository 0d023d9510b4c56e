//! Winner records, one per drawn competition.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Winner {
    pub id: String,
    pub competition_id: String,
    pub competition_title: String,
    pub user_id: String,
    pub user_name: String,
    pub winning_ticket: i64,
    pub prize_value: f64,
    pub drawn_at: String,
}
