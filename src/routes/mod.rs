use axum::{
    middleware,
    routing::{get, post, put},
    Json, Router,
};

use crate::handlers::{passes, rides, scanner, trips, wallet};
use crate::middleware::auth::{auth_middleware, require_admin, require_conductor};
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Rider routes (any authenticated user, ownership checked per handler)
    let trip_routes = Router::new()
        .route("/start", post(trips::start_trip))
        .route("/{id}/end", put(trips::end_trip))
        .route("/active/{user_id}", get(trips::active_trip))
        .route("/user/{user_id}", get(trips::trip_history))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let ride_routes = Router::new()
        .route("/start", post(rides::start_ride))
        .route("/{id}/end", put(trips::end_trip))
        .route("/active/{user_id}", get(trips::active_trip))
        .route("/history/{user_id}", get(trips::trip_history))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let pass_routes = Router::new()
        .route("/", post(passes::purchase_pass).get(passes::current_pass))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let pass_usage_routes = Router::new()
        .route("/", get(passes::usage_history))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let wallet_routes = Router::new()
        .route("/{user_id}", get(wallet::get_wallet))
        .route("/{user_id}/add", post(wallet::add_funds))
        .route("/{user_id}/deduct", post(wallet::deduct_funds))
        .route("/{user_id}/transactions", get(wallet::transactions))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Scanner devices (requires auth + conductor role)
    let scanner_routes = Router::new()
        .route("/scanners/{scanner_id}/scan", post(scanner::scan))
        .route("/passes/validate", post(scanner::validate_pass))
        .layer(middleware::from_fn(require_conductor))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Admin routes (requires auth + admin role)
    let admin_routes = Router::new()
        .route("/rides/active", get(rides::active_rides))
        .route("/rides/completed", get(rides::completed_rides))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({ "status": "ok" })) }))
        .nest("/api/trips", trip_routes)
        .nest("/api/rides", ride_routes)
        .nest("/api/passes", pass_routes)
        .nest("/api/pass-usage", pass_usage_routes)
        .nest("/api/wallet", wallet_routes)
        .nest("/api", scanner_routes)
        .nest("/api/admin", admin_routes)
        .with_state(state)
}
