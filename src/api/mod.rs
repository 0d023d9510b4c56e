mod admin;
pub mod auth;
mod competitions;
mod content;
pub mod error;
mod orders;
pub mod rate_limit;
mod validation;
mod winners;

use axum::{
    extract::State,
    http::{header, Method},
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;
use crate::AppState;
use error::ApiError;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Credential endpoints get the stricter auth rate limit
    let credential_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/session", post(auth::oauth_session))
        .route("/logout", post(auth::logout))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    let account_routes = Router::new()
        .route("/me", get(auth::me))
        .route("/profile", put(auth::update_profile));

    // Public catalogue and content
    let public_routes = Router::new()
        .route("/competitions", get(competitions::list_competitions))
        .route("/competitions/featured", get(competitions::featured_competitions))
        .route("/competitions/:id", get(competitions::get_competition))
        .route("/winners", get(winners::list_winners))
        .route("/content/faq", get(content::get_faq))
        .route("/content/:kind", get(content::get_text_content))
        .route("/contact", post(content::submit_contact))
        .route("/seed", post(seed_demo_data));

    // Endpoints that require a session (enforced by the User extractor)
    let user_routes = Router::new()
        .route("/tickets/purchase", post(orders::purchase_tickets))
        .route("/tickets/my", get(orders::my_tickets))
        .route("/orders/my", get(orders::my_orders))
        .route("/orders/:id/confirm", post(orders::confirm_order));

    // Privileged management (enforced by the AdminUser extractor)
    let admin_routes = Router::new()
        .route("/stats", get(admin::get_stats))
        .route(
            "/competitions",
            get(admin::list_competitions).post(admin::create_competition),
        )
        .route(
            "/competitions/:id",
            put(admin::update_competition).delete(admin::delete_competition),
        )
        .route("/competitions/:id/draw", post(admin::draw_competition))
        .route("/users", get(admin::list_users))
        .route("/users/:id/role", put(admin::update_user_role))
        .route("/orders", get(admin::list_orders))
        .route("/orders/:id/refund", post(admin::refund_order))
        .route("/content/faq", put(content::update_faq))
        .route("/content/:kind", put(content::update_text_content));

    let api_routes = Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .nest("/admin", admin_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ));

    let cors = build_cors(&state.config.cors);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", credential_routes.merge(account_routes))
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors(config: &CorsConfig) -> CorsLayer {
    if config.origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<_> = config
        .origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn health_check() -> &'static str {
    "OK"
}

/// Idempotent demo-data seeding
///
/// POST /api/seed
async fn seed_demo_data(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let seeded = crate::db::seeders::seed_demo_data(&state.db)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Seeding failed");
            ApiError::internal("Seeding failed")
        })?;

    let message = if seeded {
        "Data seeded successfully"
    } else {
        "Data already seeded"
    };

    Ok(Json(serde_json::json!({ "message": message })))
}
