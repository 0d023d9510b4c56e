// Editable site content (FAQ, terms, privacy) and the contact form.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::auth::AdminUser;
use super::error::ApiError;
use super::validation::{validate_email, validate_full_name, validate_message};
use crate::db::{ContactRequest, FaqItem, UpdateTextContentRequest, TEXT_CONTENT_KINDS};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct FaqResponse {
    pub items: Vec<FaqItem>,
}

#[derive(Debug, Serialize)]
pub struct TextContentResponse {
    pub content: String,
}

/// GET /api/content/faq
pub async fn get_faq(State(state): State<Arc<AppState>>) -> Result<Json<FaqResponse>, ApiError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT body FROM content WHERE kind = 'faq'")
        .fetch_optional(&state.db)
        .await?;

    let items = row
        .and_then(|(body,)| serde_json::from_str(&body).ok())
        .unwrap_or_default();

    Ok(Json(FaqResponse { items }))
}

/// GET /api/content/:kind  (terms, privacy, cookies)
pub async fn get_text_content(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<TextContentResponse>, ApiError> {
    if !TEXT_CONTENT_KINDS.contains(&kind.as_str()) {
        return Err(ApiError::not_found("Unknown content kind"));
    }

    let row: Option<(String,)> = sqlx::query_as("SELECT body FROM content WHERE kind = ?")
        .bind(&kind)
        .fetch_optional(&state.db)
        .await?;

    Ok(Json(TextContentResponse {
        content: row.map(|(body,)| body).unwrap_or_default(),
    }))
}

/// PUT /api/admin/content/faq
pub async fn update_faq(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Json(items): Json<Vec<FaqItem>>,
) -> Result<Json<FaqResponse>, ApiError> {
    let body = serde_json::to_string(&items)
        .map_err(|e| ApiError::internal(format!("Failed to serialize FAQ: {}", e)))?;

    upsert_content(&state, "faq", &body).await?;

    Ok(Json(FaqResponse { items }))
}

/// PUT /api/admin/content/:kind  (terms, privacy, cookies)
pub async fn update_text_content(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(kind): Path<String>,
    Json(req): Json<UpdateTextContentRequest>,
) -> Result<Json<TextContentResponse>, ApiError> {
    if !TEXT_CONTENT_KINDS.contains(&kind.as_str()) {
        return Err(ApiError::validation_field(
            "kind",
            format!("Must be one of: {}", TEXT_CONTENT_KINDS.join(", ")),
        ));
    }

    upsert_content(&state, &kind, &req.content).await?;

    Ok(Json(TextContentResponse {
        content: req.content,
    }))
}

async fn upsert_content(state: &AppState, kind: &str, body: &str) -> Result<(), ApiError> {
    sqlx::query(
        r#"
        INSERT INTO content (kind, body, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(kind) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
        "#,
    )
    .bind(kind)
    .bind(body)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub message: String,
    pub id: String,
}

/// POST /api/contact
pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ContactRequest>,
) -> Result<(StatusCode, Json<ContactResponse>), ApiError> {
    let mut errors = super::error::ValidationErrorBuilder::new();
    if let Err(e) = validate_full_name(&req.name) {
        errors.add("name", e);
    }
    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_message(&req.message) {
        errors.add("message", e);
    }
    errors.finish()?;

    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO contact_messages (id, name, email, message, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&req.name)
    .bind(&req.email)
    .bind(&req.message)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ContactResponse {
            message: "Message received".to_string(),
            id,
        }),
    ))
}
