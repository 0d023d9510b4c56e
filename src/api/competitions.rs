// Public competition endpoints.
//
// Status is derived per request, so listings filter on it after loading the
// visible rows rather than in SQL.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use super::error::ApiError;
use crate::db::{Competition, CompetitionResponse, CompetitionStatus, ListCompetitionsQuery};
use crate::AppState;

/// List visible competitions
///
/// GET /api/competitions
pub async fn list_competitions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListCompetitionsQuery>,
) -> Result<Json<Vec<CompetitionResponse>>, ApiError> {
    let mut sql = String::from("SELECT * FROM competitions WHERE is_visible = 1");
    if query.category.is_some() {
        sql.push_str(" AND category = ?");
    }
    if query.featured.is_some() {
        sql.push_str(" AND featured = ?");
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut q = sqlx::query_as::<_, Competition>(&sql);
    if let Some(ref category) = query.category {
        q = q.bind(category.to_lowercase());
    }
    if let Some(featured) = query.featured {
        q = q.bind(featured as i64);
    }

    let competitions = q.fetch_all(&state.db).await?;

    let status_filter = match query.status.as_deref() {
        Some(s) => Some(
            CompetitionStatus::parse(s)
                .ok_or_else(|| ApiError::validation_field("status", "Unknown status filter"))?,
        ),
        None => None,
    };

    let result: Vec<CompetitionResponse> = competitions
        .into_iter()
        .map(CompetitionResponse::from)
        .filter(|c| status_filter.map_or(true, |s| c.status == s))
        .collect();

    Ok(Json(result))
}

/// Featured competitions that are still open
///
/// GET /api/competitions/featured
pub async fn featured_competitions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CompetitionResponse>>, ApiError> {
    let competitions: Vec<Competition> = sqlx::query_as(
        "SELECT * FROM competitions WHERE is_visible = 1 AND featured = 1 ORDER BY created_at DESC LIMIT 10",
    )
    .fetch_all(&state.db)
    .await?;

    let result: Vec<CompetitionResponse> = competitions
        .into_iter()
        .map(CompetitionResponse::from)
        .filter(|c| c.status.is_purchasable())
        .collect();

    Ok(Json(result))
}

/// Competition detail
///
/// GET /api/competitions/:id
pub async fn get_competition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CompetitionResponse>, ApiError> {
    let competition: Option<Competition> =
        sqlx::query_as("SELECT * FROM competitions WHERE id = ?")
            .bind(&id)
            .fetch_optional(&state.db)
            .await?;

    let competition = competition.ok_or_else(|| ApiError::not_found("Competition not found"))?;

    Ok(Json(CompetitionResponse::from(competition)))
}
