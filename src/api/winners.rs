// Public winner list.

use axum::{extract::State, Json};
use std::sync::Arc;

use super::error::ApiError;
use crate::db::Winner;
use crate::AppState;

/// Recent winners, newest first
///
/// GET /api/winners
pub async fn list_winners(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Winner>>, ApiError> {
    let winners: Vec<Winner> =
        sqlx::query_as("SELECT * FROM winners ORDER BY drawn_at DESC LIMIT 50")
            .fetch_all(&state.db)
            .await?;

    Ok(Json(winners))
}
