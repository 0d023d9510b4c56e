//! Competition models and DTOs.
//!
//! Competition status is derived, never stored: a drawn winner makes the
//! competition `completed` regardless of anything else, a full sellout makes
//! it `sold_out`, and otherwise the draw date decides between `completed`,
//! `ending_soon` and `live`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionStatus {
    Live,
    EndingSoon,
    SoldOut,
    Completed,
}

impl std::fmt::Display for CompetitionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::EndingSoon => write!(f, "ending_soon"),
            Self::SoldOut => write!(f, "sold_out"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl CompetitionStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "live" => Some(Self::Live),
            "ending_soon" => Some(Self::EndingSoon),
            "sold_out" => Some(Self::SoldOut),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Tickets can only be bought while the competition is live or ending soon.
    pub fn is_purchasable(&self) -> bool {
        matches!(self, Self::Live | Self::EndingSoon)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Competition {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub prize_value: f64,
    pub ticket_price: f64,
    pub total_tickets: i64,
    pub tickets_sold: i64,
    pub draw_date: String,
    pub image_url: String,
    pub featured: i64,
    pub auto_draw: i64,
    pub is_visible: i64,
    pub winner_id: Option<String>,
    pub winner_ticket: Option<i64>,
    pub created_at: String,
}

impl Competition {
    /// Derive the status at a given instant.
    pub fn status_at(&self, now: DateTime<Utc>) -> CompetitionStatus {
        if self.winner_id.is_some() {
            return CompetitionStatus::Completed;
        }
        if self.tickets_sold >= self.total_tickets {
            return CompetitionStatus::SoldOut;
        }
        let draw_date = match DateTime::parse_from_rfc3339(&self.draw_date) {
            Ok(d) => d.with_timezone(&Utc),
            // An unparseable draw date closes the competition rather than
            // leaving it purchasable forever.
            Err(_) => return CompetitionStatus::Completed,
        };
        if draw_date <= now {
            return CompetitionStatus::Completed;
        }
        if draw_date - now <= Duration::hours(24) {
            return CompetitionStatus::EndingSoon;
        }
        CompetitionStatus::Live
    }

    pub fn status(&self) -> CompetitionStatus {
        self.status_at(Utc::now())
    }

    pub fn tickets_available(&self) -> i64 {
        (self.total_tickets - self.tickets_sold).max(0)
    }
}

/// Competition as returned by the API, with the derived status attached.
#[derive(Debug, Clone, Serialize)]
pub struct CompetitionResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub prize_value: f64,
    pub ticket_price: f64,
    pub total_tickets: i64,
    pub tickets_sold: i64,
    pub draw_date: String,
    pub image_url: String,
    pub featured: bool,
    pub auto_draw: bool,
    pub is_visible: bool,
    pub status: CompetitionStatus,
    pub winner_id: Option<String>,
    pub winner_ticket: Option<i64>,
    pub created_at: String,
}

impl From<Competition> for CompetitionResponse {
    fn from(c: Competition) -> Self {
        let status = c.status();
        Self {
            id: c.id,
            title: c.title,
            description: c.description,
            category: c.category,
            prize_value: c.prize_value,
            ticket_price: c.ticket_price,
            total_tickets: c.total_tickets,
            tickets_sold: c.tickets_sold,
            draw_date: c.draw_date,
            image_url: c.image_url,
            featured: c.featured != 0,
            auto_draw: c.auto_draw != 0,
            is_visible: c.is_visible != 0,
            status,
            winner_id: c.winner_id,
            winner_ticket: c.winner_ticket,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCompetitionRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    pub prize_value: f64,
    pub ticket_price: f64,
    pub total_tickets: i64,
    /// ISO 8601 timestamp
    pub draw_date: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "default_true")]
    pub auto_draw: bool,
    #[serde(default = "default_true")]
    pub is_visible: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCompetitionRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub prize_value: Option<f64>,
    pub ticket_price: Option<f64>,
    pub total_tickets: Option<i64>,
    pub draw_date: Option<String>,
    pub image_url: Option<String>,
    pub featured: Option<bool>,
    pub auto_draw: Option<bool>,
    pub is_visible: Option<bool>,
}

/// Query-string filters for the public competition listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListCompetitionsQuery {
    pub category: Option<String>,
    pub status: Option<String>,
    pub featured: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn competition(draw_in_hours: i64, sold: i64, total: i64) -> Competition {
        let now = Utc::now();
        Competition {
            id: "c1".to_string(),
            title: "Test".to_string(),
            description: "Test".to_string(),
            category: "cash".to_string(),
            prize_value: 1000.0,
            ticket_price: 1.0,
            total_tickets: total,
            tickets_sold: sold,
            draw_date: (now + Duration::hours(draw_in_hours)).to_rfc3339(),
            image_url: String::new(),
            featured: 0,
            auto_draw: 1,
            is_visible: 1,
            winner_id: None,
            winner_ticket: None,
            created_at: now.to_rfc3339(),
        }
    }

    #[test]
    fn test_status_live() {
        let c = competition(48, 10, 100);
        assert_eq!(c.status(), CompetitionStatus::Live);
        assert!(c.status().is_purchasable());
    }

    #[test]
    fn test_status_ending_soon() {
        let c = competition(12, 10, 100);
        assert_eq!(c.status(), CompetitionStatus::EndingSoon);
        assert!(c.status().is_purchasable());
    }

    #[test]
    fn test_status_completed_after_draw_date() {
        let c = competition(-1, 10, 100);
        assert_eq!(c.status(), CompetitionStatus::Completed);
        assert!(!c.status().is_purchasable());
    }

    #[test]
    fn test_status_sold_out() {
        let c = competition(48, 100, 100);
        assert_eq!(c.status(), CompetitionStatus::SoldOut);
        assert!(!c.status().is_purchasable());
    }

    #[test]
    fn test_winner_beats_sellout() {
        let mut c = competition(48, 100, 100);
        c.winner_id = Some("u1".to_string());
        assert_eq!(c.status(), CompetitionStatus::Completed);
    }

    #[test]
    fn test_unparseable_draw_date_closes() {
        let mut c = competition(48, 0, 100);
        c.draw_date = "not-a-date".to_string();
        assert_eq!(c.status(), CompetitionStatus::Completed);
    }

    #[test]
    fn test_tickets_available() {
        let c = competition(48, 30, 100);
        assert_eq!(c.tickets_available(), 70);
    }

    #[test]
    fn test_status_parse_round_trip() {
        for s in ["live", "ending_soon", "sold_out", "completed"] {
            assert_eq!(CompetitionStatus::parse(s).unwrap().to_string(), s);
        }
        assert!(CompetitionStatus::parse("draft").is_none());
    }
}
