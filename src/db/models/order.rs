//! Order models and DTOs.
//!
//! The `ticket_numbers` column stores a JSON array of the numbers allocated
//! at reservation time, so `ticket_numbers.len() == quantity` holds for the
//! entire life of an order.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Refunded => write!(f, "refunded"),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "refunded" => Self::Refunded,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub competition_id: String,
    pub competition_title: String,
    /// JSON array of allocated ticket numbers
    pub ticket_numbers: String,
    pub quantity: i64,
    pub total_price: f64,
    pub payment_status: String,
    pub payment_id: Option<String>,
    pub expires_at: String,
    pub created_at: String,
}

impl Order {
    pub fn status_enum(&self) -> PaymentStatus {
        PaymentStatus::from(self.payment_status.clone())
    }

    pub fn ticket_numbers(&self) -> Vec<i64> {
        serde_json::from_str(&self.ticket_numbers).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub competition_id: String,
    pub competition_title: String,
    pub ticket_numbers: Vec<i64>,
    pub quantity: i64,
    pub total_price: f64,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub created_at: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let ticket_numbers = order.ticket_numbers();
        let payment_status = order.status_enum();
        Self {
            id: order.id,
            user_id: order.user_id,
            competition_id: order.competition_id,
            competition_title: order.competition_title,
            ticket_numbers,
            quantity: order.quantity,
            total_price: order.total_price,
            payment_status,
            payment_id: order.payment_id,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub competition_id: String,
    pub quantity: i64,
}

/// A user's completed tickets for one competition, for the dashboard view.
#[derive(Debug, Clone, Serialize)]
pub struct TicketGroup {
    pub competition_id: String,
    pub competition_title: String,
    pub draw_date: Option<String>,
    pub status: Option<crate::db::CompetitionStatus>,
    pub tickets: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_numbers_round_trip() {
        let order = Order {
            id: "o1".to_string(),
            user_id: "u1".to_string(),
            competition_id: "c1".to_string(),
            competition_title: "Test".to_string(),
            ticket_numbers: "[3,17,42]".to_string(),
            quantity: 3,
            total_price: 3.0,
            payment_status: "pending".to_string(),
            payment_id: None,
            expires_at: "2030-01-01T00:00:00Z".to_string(),
            created_at: "2030-01-01T00:00:00Z".to_string(),
        };
        assert_eq!(order.ticket_numbers(), vec![3, 17, 42]);
        assert_eq!(order.status_enum(), PaymentStatus::Pending);

        let resp = OrderResponse::from(order);
        assert_eq!(resp.ticket_numbers.len() as i64, resp.quantity);
    }

    #[test]
    fn test_malformed_ticket_numbers_empty() {
        let order = Order {
            id: "o1".to_string(),
            user_id: "u1".to_string(),
            competition_id: "c1".to_string(),
            competition_title: "Test".to_string(),
            ticket_numbers: "oops".to_string(),
            quantity: 0,
            total_price: 0.0,
            payment_status: "failed".to_string(),
            payment_id: None,
            expires_at: "2030-01-01T00:00:00Z".to_string(),
            created_at: "2030-01-01T00:00:00Z".to_string(),
        };
        assert!(order.ticket_numbers().is_empty());
    }
}
