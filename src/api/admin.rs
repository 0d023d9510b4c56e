// Privileged management endpoints, all gated by the AdminUser extractor.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::auth::AdminUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_category, validate_description, validate_draw_date, validate_image_url,
    validate_price, validate_role, validate_title, validate_total_tickets, validate_uuid,
};
use crate::db::{
    AdminStats, Competition, CompetitionResponse, CreateCompetitionRequest, Order, OrderResponse,
    UpdateCompetitionRequest, User, UserResponse, Winner,
};
use crate::engine::{draw_winner, DrawError};
use crate::AppState;

/// Dashboard counters
///
/// GET /api/admin/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<AdminStats>, ApiError> {
    let stats = AdminStats::collect(&state.db).await?;
    Ok(Json(stats))
}

fn validate_create_request(req: &CreateCompetitionRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_title(&req.title) {
        errors.add("title", e);
    }
    if let Err(e) = validate_description(&req.description) {
        errors.add("description", e);
    }
    if let Err(e) = validate_category(&req.category) {
        errors.add("category", e);
    }
    if let Err(e) = validate_price(req.prize_value, "prize_value") {
        errors.add("prize_value", e);
    }
    if let Err(e) = validate_price(req.ticket_price, "ticket_price") {
        errors.add("ticket_price", e);
    }
    if let Err(e) = validate_total_tickets(req.total_tickets) {
        errors.add("total_tickets", e);
    }
    if let Err(e) = validate_draw_date(&req.draw_date) {
        errors.add("draw_date", e);
    }
    if let Err(e) = validate_image_url(&req.image_url) {
        errors.add("image_url", e);
    }

    errors.finish()
}

fn validate_update_request(req: &UpdateCompetitionRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(ref title) = req.title {
        if let Err(e) = validate_title(title) {
            errors.add("title", e);
        }
    }
    if let Some(ref description) = req.description {
        if let Err(e) = validate_description(description) {
            errors.add("description", e);
        }
    }
    if let Some(ref category) = req.category {
        if let Err(e) = validate_category(category) {
            errors.add("category", e);
        }
    }
    if let Some(prize_value) = req.prize_value {
        if let Err(e) = validate_price(prize_value, "prize_value") {
            errors.add("prize_value", e);
        }
    }
    if let Some(ticket_price) = req.ticket_price {
        if let Err(e) = validate_price(ticket_price, "ticket_price") {
            errors.add("ticket_price", e);
        }
    }
    if let Some(total_tickets) = req.total_tickets {
        if let Err(e) = validate_total_tickets(total_tickets) {
            errors.add("total_tickets", e);
        }
    }
    if let Some(ref draw_date) = req.draw_date {
        if let Err(e) = validate_draw_date(draw_date) {
            errors.add("draw_date", e);
        }
    }
    if let Some(ref image_url) = req.image_url {
        if let Err(e) = validate_image_url(image_url) {
            errors.add("image_url", e);
        }
    }

    errors.finish()
}

/// All competitions, including hidden ones
///
/// GET /api/admin/competitions
pub async fn list_competitions(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<CompetitionResponse>>, ApiError> {
    let competitions: Vec<Competition> =
        sqlx::query_as("SELECT * FROM competitions ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?;

    Ok(Json(
        competitions.into_iter().map(CompetitionResponse::from).collect(),
    ))
}

/// POST /api/admin/competitions
pub async fn create_competition(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CreateCompetitionRequest>,
) -> Result<(StatusCode, Json<CompetitionResponse>), ApiError> {
    validate_create_request(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO competitions (id, title, description, category, prize_value, ticket_price,
                                  total_tickets, tickets_sold, draw_date, image_url, featured,
                                  auto_draw, is_visible, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.category.to_lowercase())
    .bind(req.prize_value)
    .bind(req.ticket_price)
    .bind(req.total_tickets)
    .bind(&req.draw_date)
    .bind(&req.image_url)
    .bind(req.featured as i64)
    .bind(req.auto_draw as i64)
    .bind(req.is_visible as i64)
    .bind(&now)
    .execute(&state.db)
    .await?;

    tracing::info!(competition = %id, admin = %admin.id, "Competition created");

    let competition = sqlx::query_as::<_, Competition>("SELECT * FROM competitions WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(CompetitionResponse::from(competition))))
}

/// PUT /api/admin/competitions/:id
pub async fn update_competition(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateCompetitionRequest>,
) -> Result<Json<CompetitionResponse>, ApiError> {
    if let Err(e) = validate_uuid(&id, "competition_id") {
        return Err(ApiError::validation_field("competition_id", e));
    }
    validate_update_request(&req)?;

    let existing: Option<Competition> =
        sqlx::query_as("SELECT * FROM competitions WHERE id = ?")
            .bind(&id)
            .fetch_optional(&state.db)
            .await?;
    let existing = existing.ok_or_else(|| ApiError::not_found("Competition not found"))?;

    // None means "keep existing"
    let title = req.title.unwrap_or(existing.title);
    let description = req.description.unwrap_or(existing.description);
    let category = req
        .category
        .map(|c| c.to_lowercase())
        .unwrap_or(existing.category);
    let prize_value = req.prize_value.unwrap_or(existing.prize_value);
    let ticket_price = req.ticket_price.unwrap_or(existing.ticket_price);
    let total_tickets = req.total_tickets.unwrap_or(existing.total_tickets);
    let draw_date = req.draw_date.unwrap_or(existing.draw_date);
    let image_url = req.image_url.unwrap_or(existing.image_url);
    let featured = req.featured.map(|b| b as i64).unwrap_or(existing.featured);
    let auto_draw = req.auto_draw.map(|b| b as i64).unwrap_or(existing.auto_draw);
    let is_visible = req
        .is_visible
        .map(|b| b as i64)
        .unwrap_or(existing.is_visible);

    if total_tickets < existing.tickets_sold {
        return Err(ApiError::validation_field(
            "total_tickets",
            format!("Cannot shrink below {} tickets already sold", existing.tickets_sold),
        ));
    }

    sqlx::query(
        r#"
        UPDATE competitions
        SET title = ?, description = ?, category = ?, prize_value = ?, ticket_price = ?,
            total_tickets = ?, draw_date = ?, image_url = ?, featured = ?, auto_draw = ?,
            is_visible = ?
        WHERE id = ?
        "#,
    )
    .bind(&title)
    .bind(&description)
    .bind(&category)
    .bind(prize_value)
    .bind(ticket_price)
    .bind(total_tickets)
    .bind(&draw_date)
    .bind(&image_url)
    .bind(featured)
    .bind(auto_draw)
    .bind(is_visible)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let competition = sqlx::query_as::<_, Competition>("SELECT * FROM competitions WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(CompetitionResponse::from(competition)))
}

/// DELETE /api/admin/competitions/:id
pub async fn delete_competition(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let (order_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM orders WHERE competition_id = ?")
            .bind(&id)
            .fetch_one(&state.db)
            .await?;
    if order_count > 0 {
        return Err(ApiError::conflict(
            "Cannot delete a competition that has orders",
        ));
    }

    let result = sqlx::query("DELETE FROM competitions WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Competition not found"));
    }

    tracing::info!(competition = %id, admin = %admin.id, "Competition deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Manually draw a winner
///
/// POST /api/admin/competitions/:id/draw
pub async fn draw_competition(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Winner>, ApiError> {
    let outcome = draw_winner(&state.db, &id).await.map_err(|e| match e {
        DrawError::NotFound => ApiError::not_found("Competition not found"),
        DrawError::AlreadyDrawn => ApiError::conflict("Winner already drawn"),
        DrawError::NoEntries => ApiError::bad_request("No tickets sold yet"),
        DrawError::Db(e) => ApiError::from(e),
    })?;

    tracing::info!(competition = %id, admin = %admin.id, "Manual draw performed");

    if let Some(to) = outcome.winner_email.clone() {
        let email = state.email.clone();
        let winner = outcome.winner.clone();
        tokio::spawn(async move {
            if let Err(e) = email.send_winner_email(&to, &winner).await {
                tracing::warn!(error = %e, "Failed to send winner email");
            }
        });
    }

    Ok(Json(outcome.winner))
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// PUT /api/admin/users/:id/role
pub async fn update_user_role(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if let Err(e) = validate_role(&req.role) {
        return Err(ApiError::validation_field("role", e));
    }

    // An admin demoting themselves would lock the last admin out
    if user_id == admin.id && req.role != "admin" {
        return Err(ApiError::bad_request("Cannot change your own role"));
    }

    let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(&req.role)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&user_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(user = %user_id, role = %req.role, admin = %admin.id, "User role updated");

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&user_id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(UserResponse::from(user)))
}

/// GET /api/admin/orders
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders: Vec<Order> = sqlx::query_as("SELECT * FROM orders ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// Refund a completed order, releasing its tickets
///
/// POST /api/admin/orders/:id/refund
pub async fn refund_order(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let mut tx = state.db.begin().await?;

    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = ?")
        .bind(&order_id)
        .fetch_optional(&mut *tx)
        .await?;
    let order = order.ok_or_else(|| ApiError::not_found("Order not found"))?;

    if order.payment_status != "completed" {
        return Err(ApiError::bad_request("Order not eligible for refund"));
    }

    sqlx::query("UPDATE orders SET payment_status = 'refunded' WHERE id = ?")
        .bind(&order.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE competitions SET tickets_sold = tickets_sold - ? WHERE id = ?")
        .bind(order.quantity)
        .bind(&order.competition_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(order = %order.id, admin = %admin.id, "Order refunded");

    let refunded = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
        .bind(&order.id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(OrderResponse::from(refunded)))
}
