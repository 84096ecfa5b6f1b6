use crate::api::handlers;
use crate::dashboard::Dashboard;
use axum::{
    extract::Request,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::Level;

pub fn create_router(dashboard: Arc<Dashboard>) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::health));

    let api_routes = Router::new()
        .route("/api/v1/dashboard", get(handlers::get_dashboard))
        .route("/api/v1/dashboard/refresh", post(handlers::refresh))
        .route(
            "/api/v1/appliances/{id}/toggle",
            post(handlers::toggle_appliance),
        )
        .route("/api/v1/appliances/names", put(handlers::rename_appliances))
        .route("/api/v1/reports/monthly", get(handlers::monthly_report))
        .route(
            "/api/v1/notifications/test",
            post(handlers::test_notification),
        );

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .with_state(dashboard)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    tracing::span!(
                        Level::INFO,
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(
                    |response: &axum::response::Response,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::event!(
                            Level::INFO,
                            status = response.status().as_u16(),
                            latency = ?latency,
                            "request completed"
                        );
                    },
                ),
        )
}
