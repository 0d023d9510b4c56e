// Ticket purchase and order endpoints.
//
// Purchase is two-phase: POST /tickets/purchase allocates ticket numbers and
// creates a pending order with a reservation deadline; POST
// /orders/:id/confirm captures the (mocked) payment, marks the order
// completed and bumps the competition's tickets_sold. Allocation and the
// order insert share one transaction, and confirm checks state inside its
// own transaction, so inventory can never be handed out twice.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::error::ApiError;
use super::validation::{validate_quantity, validate_uuid};
use crate::db::{
    Competition, Order, OrderResponse, PurchaseRequest, TicketGroup, User,
};
use crate::engine::{allocation, AllocationError};
use crate::AppState;

/// Reserve tickets (phase 1)
///
/// POST /api/tickets/purchase
pub async fn purchase_tickets(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    if let Err(e) = validate_quantity(req.quantity, state.config.purchase.max_tickets_per_order) {
        return Err(ApiError::validation_field("quantity", e));
    }

    let now = chrono::Utc::now();
    let now_str = now.to_rfc3339();

    let mut tx = state.db.begin().await?;

    let competition: Option<Competition> =
        sqlx::query_as("SELECT * FROM competitions WHERE id = ?")
            .bind(&req.competition_id)
            .fetch_optional(&mut *tx)
            .await?;
    let competition =
        competition.ok_or_else(|| ApiError::not_found("Competition not found"))?;

    if !competition.status_at(now).is_purchasable() {
        return Err(ApiError::bad_request(
            "Competition is not available for purchase",
        ));
    }

    let ticket_numbers = allocation::allocate(
        &mut *tx,
        &competition.id,
        competition.total_tickets,
        req.quantity,
        &now_str,
    )
    .await
    .map_err(|e| match e {
        AllocationError::Insufficient { available } => {
            ApiError::bad_request(format!("Only {} tickets available", available))
        }
        AllocationError::Db(e) => ApiError::from(e),
    })?;

    let order_id = uuid::Uuid::new_v4().to_string();
    let total_price = competition.ticket_price * req.quantity as f64;
    let expires_at = (now
        + chrono::Duration::minutes(state.config.purchase.pending_ttl_minutes))
    .to_rfc3339();
    let numbers_json = serde_json::to_string(&ticket_numbers)
        .map_err(|e| ApiError::internal(format!("Failed to serialize tickets: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO orders (id, user_id, competition_id, competition_title, ticket_numbers,
                            quantity, total_price, payment_status, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(&order_id)
    .bind(&user.id)
    .bind(&competition.id)
    .bind(&competition.title)
    .bind(&numbers_json)
    .bind(req.quantity)
    .bind(total_price)
    .bind(&expires_at)
    .bind(&now_str)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        order = %order_id,
        competition = %competition.id,
        user = %user.id,
        quantity = req.quantity,
        "Tickets reserved"
    );

    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
        .bind(&order_id)
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from(order))))
}

/// Commit payment and finalize the order (phase 2)
///
/// POST /api/orders/:id/confirm
pub async fn confirm_order(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    if let Err(e) = validate_uuid(&order_id, "order_id") {
        return Err(ApiError::validation_field("order_id", e));
    }

    let now = chrono::Utc::now().to_rfc3339();

    let mut tx = state.db.begin().await?;

    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE id = ? AND user_id = ?")
            .bind(&order_id)
            .bind(&user.id)
            .fetch_optional(&mut *tx)
            .await?;
    let order = order.ok_or_else(|| ApiError::not_found("Order not found"))?;

    match order.payment_status.as_str() {
        "pending" => {}
        "completed" => return Err(ApiError::conflict("Order already completed")),
        _ => return Err(ApiError::bad_request("Order is no longer confirmable")),
    }

    if order.expires_at <= now {
        return Err(ApiError::bad_request("Reservation has expired"));
    }

    // Payment capture is mocked: a synthetic payment id stands in for the
    // provider reference.
    let payment_ref = uuid::Uuid::new_v4().simple().to_string();
    let payment_id = format!("pay_{}", &payment_ref[..12]);

    sqlx::query("UPDATE orders SET payment_status = 'completed', payment_id = ? WHERE id = ?")
        .bind(&payment_id)
        .bind(&order.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE competitions SET tickets_sold = tickets_sold + ? WHERE id = ?")
        .bind(order.quantity)
        .bind(&order.competition_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        order = %order.id,
        competition = %order.competition_id,
        user = %user.id,
        "Order confirmed"
    );

    let confirmed = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
        .bind(&order.id)
        .fetch_one(&state.db)
        .await?;

    // Confirmation email, fire and forget
    let email = state.email.clone();
    let to = user.email.clone();
    let name = user.full_name.clone();
    let mail_order = confirmed.clone();
    tokio::spawn(async move {
        if let Err(e) = email.send_order_confirmation(&to, &name, &mail_order).await {
            tracing::warn!(error = %e, "Failed to send order confirmation email");
        }
    });

    Ok(Json(OrderResponse::from(confirmed)))
}

/// The caller's orders, newest first
///
/// GET /api/orders/my
pub async fn my_orders(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders: Vec<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE user_id = ? ORDER BY created_at DESC")
            .bind(&user.id)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// The caller's completed tickets grouped by competition
///
/// GET /api/tickets/my
pub async fn my_tickets(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<TicketGroup>>, ApiError> {
    let orders: Vec<Order> = sqlx::query_as(
        "SELECT * FROM orders WHERE user_id = ? AND payment_status = 'completed' ORDER BY created_at ASC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    let mut groups: Vec<TicketGroup> = Vec::new();
    for order in orders {
        let tickets = order.ticket_numbers();
        if let Some(group) = groups
            .iter_mut()
            .find(|g| g.competition_id == order.competition_id)
        {
            group.tickets.extend(tickets);
            continue;
        }

        let competition: Option<Competition> =
            sqlx::query_as("SELECT * FROM competitions WHERE id = ?")
                .bind(&order.competition_id)
                .fetch_optional(&state.db)
                .await?;

        groups.push(TicketGroup {
            competition_id: order.competition_id.clone(),
            competition_title: competition
                .as_ref()
                .map(|c| c.title.clone())
                .unwrap_or_else(|| order.competition_title.clone()),
            draw_date: competition.as_ref().map(|c| c.draw_date.clone()),
            status: competition.as_ref().map(|c| c.status()),
            tickets,
        });
    }

    Ok(Json(groups))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::config::Config;
    use crate::db::DbPool;
    use axum::extract::{Path, State};
    use std::collections::HashSet;

    async fn test_state() -> Arc<AppState> {
        let db = crate::db::init_in_memory().await.unwrap();
        Arc::new(AppState::new(Config::default(), db))
    }

    async fn seed_user(db: &DbPool, id: &str) -> User {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, full_name, role, email_verified, created_at, updated_at)
            VALUES (?, ?, '', 'Buyer One', 'user', 0, ?, ?)
            "#,
        )
        .bind(id)
        .bind(format!("{id}@example.com"))
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await
        .unwrap();

        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(db)
            .await
            .unwrap()
    }

    async fn seed_competition(db: &DbPool, id: &str, total: i64, price: f64) {
        let now = chrono::Utc::now();
        sqlx::query(
            r#"
            INSERT INTO competitions (id, title, description, category, prize_value, ticket_price,
                                      total_tickets, tickets_sold, draw_date, created_at)
            VALUES (?, 'Test Prize', 'Test', 'cash', 1000.0, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(id)
        .bind(price)
        .bind(total)
        .bind((now + chrono::Duration::days(7)).to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(db)
        .await
        .unwrap();
    }

    async fn reserve(
        state: &Arc<AppState>,
        user: &User,
        competition_id: &str,
        quantity: i64,
    ) -> Result<OrderResponse, ApiError> {
        let (status, Json(order)) = purchase_tickets(
            State(state.clone()),
            user.clone(),
            Json(PurchaseRequest {
                competition_id: competition_id.to_string(),
                quantity,
            }),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED);
        Ok(order)
    }

    #[tokio::test]
    async fn test_reserve_then_confirm() {
        let state = test_state().await;
        let user = seed_user(&state.db, "u1").await;
        seed_competition(&state.db, "comp-1", 100, 2.5).await;

        let order = reserve(&state, &user, "comp-1", 4).await.unwrap();
        assert_eq!(order.ticket_numbers.len(), 4);
        assert_eq!(order.total_price, 10.0);
        assert_eq!(order.payment_status, crate::db::PaymentStatus::Pending);

        // Reservation does not count as sold yet
        let (sold,): (i64,) =
            sqlx::query_as("SELECT tickets_sold FROM competitions WHERE id = 'comp-1'")
                .fetch_one(&state.db)
                .await
                .unwrap();
        assert_eq!(sold, 0);

        let Json(confirmed) =
            confirm_order(State(state.clone()), user.clone(), Path(order.id.clone()))
                .await
                .unwrap();
        assert_eq!(confirmed.payment_status, crate::db::PaymentStatus::Completed);
        assert!(confirmed.payment_id.is_some());
        assert_eq!(confirmed.ticket_numbers, order.ticket_numbers);

        let (sold,): (i64,) =
            sqlx::query_as("SELECT tickets_sold FROM competitions WHERE id = 'comp-1'")
                .fetch_one(&state.db)
                .await
                .unwrap();
        assert_eq!(sold, 4);

        // Confirming again conflicts
        let err = confirm_order(State(state.clone()), user, Path(order.id))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn test_pending_reservations_block_overallocation() {
        let state = test_state().await;
        let user = seed_user(&state.db, "u1").await;
        seed_competition(&state.db, "comp-1", 10, 1.0).await;

        let first = reserve(&state, &user, "comp-1", 6).await.unwrap();

        // Only 4 tickets remain while the first reservation is live
        let err = reserve(&state, &user, "comp-1", 6).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);

        let second = reserve(&state, &user, "comp-1", 4).await.unwrap();

        // No number handed out twice
        let all: HashSet<i64> = first
            .ticket_numbers
            .iter()
            .chain(second.ticket_numbers.iter())
            .copied()
            .collect();
        assert_eq!(all.len(), 10);
        assert!(all.iter().all(|&n| (1..=10).contains(&n)));
    }

    #[tokio::test]
    async fn test_expired_reservation_frees_numbers_and_cannot_confirm() {
        let state = test_state().await;
        let user = seed_user(&state.db, "u1").await;
        seed_competition(&state.db, "comp-1", 5, 1.0).await;

        let order = reserve(&state, &user, "comp-1", 5).await.unwrap();

        // Force the reservation past its deadline
        sqlx::query("UPDATE orders SET expires_at = '2000-01-01T00:00:00+00:00' WHERE id = ?")
            .bind(&order.id)
            .execute(&state.db)
            .await
            .unwrap();

        // Numbers are free again, so a fresh reservation succeeds
        let fresh = reserve(&state, &user, "comp-1", 5).await.unwrap();
        assert_eq!(fresh.ticket_numbers.len(), 5);

        // The stale order can no longer be confirmed
        let err = confirm_order(State(state.clone()), user, Path(order.id))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }

    #[tokio::test]
    async fn test_purchase_rejects_bad_quantity_and_missing_competition() {
        let state = test_state().await;
        let user = seed_user(&state.db, "u1").await;
        seed_competition(&state.db, "comp-1", 10, 1.0).await;

        let err = reserve(&state, &user, "comp-1", 0).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let err = reserve(&state, &user, "comp-1", 101).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let err = reserve(&state, &user, "nope", 1).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_closed_competition_is_not_purchasable() {
        let state = test_state().await;
        let user = seed_user(&state.db, "u1").await;
        seed_competition(&state.db, "comp-1", 10, 1.0).await;
        sqlx::query(
            "UPDATE competitions SET draw_date = '2000-01-01T00:00:00+00:00' WHERE id = 'comp-1'",
        )
        .execute(&state.db)
        .await
        .unwrap();

        let err = reserve(&state, &user, "comp-1", 1).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }

    #[tokio::test]
    async fn test_confirm_requires_ownership() {
        let state = test_state().await;
        let buyer = seed_user(&state.db, "u1").await;
        let other = seed_user(&state.db, "u2").await;
        seed_competition(&state.db, "comp-1", 10, 1.0).await;

        let order = reserve(&state, &buyer, "comp-1", 2).await.unwrap();

        let err = confirm_order(State(state.clone()), other, Path(order.id))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_my_tickets_groups_completed_orders() {
        let state = test_state().await;
        let user = seed_user(&state.db, "u1").await;
        seed_competition(&state.db, "comp-1", 100, 1.0).await;

        let first = reserve(&state, &user, "comp-1", 2).await.unwrap();
        confirm_order(State(state.clone()), user.clone(), Path(first.id))
            .await
            .unwrap();
        let second = reserve(&state, &user, "comp-1", 3).await.unwrap();
        confirm_order(State(state.clone()), user.clone(), Path(second.id))
            .await
            .unwrap();
        // A pending order must not show up
        reserve(&state, &user, "comp-1", 1).await.unwrap();

        let Json(groups) = my_tickets(State(state.clone()), user).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].competition_id, "comp-1");
        assert_eq!(groups[0].tickets.len(), 5);
    }
}
