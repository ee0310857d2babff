use axum::Router;
use axum::middleware::from_fn;
use axum::routing::{get, post, put};
use tower_http::trace::TraceLayer;
use tower_sessions::SessionManagerLayer;
use tower_sessions_sqlx_store::PostgresStore;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

pub fn build_router(
    app_state: AppState,
    session_layer: SessionManagerLayer<PostgresStore>,
) -> Router {
    let protected_routes = Router::new()
        .route(
            "/api/data/{resource}/page",
            post(handlers::data::query_data_page_handler),
        )
        .route(
            "/api/data/{resource}/validate",
            post(handlers::data::validate_data_write_handler),
        )
        .route(
            "/api/permissions/row-rules/{code}",
            put(handlers::permissions::save_row_rule_handler)
                .delete(handlers::permissions::delete_row_rule_handler),
        )
        .route(
            "/api/permissions/column-rules/{role_id}/{resource}/{column}",
            put(handlers::permissions::save_column_rule_handler)
                .delete(handlers::permissions::delete_column_rule_handler),
        )
        .route_layer(from_fn(middleware::require_principal));

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(session_layer)
        .with_state(app_state)
}
