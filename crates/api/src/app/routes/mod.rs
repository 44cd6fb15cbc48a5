use axum::{
    Router,
    routing::{get, post},
};

pub mod alerts;
pub mod antibiotics;
pub mod dispatches;
pub mod panels;
pub mod system;

/// Router for everything under `/api`.
pub fn router() -> Router {
    Router::new()
        .merge(antibiotics::router())
        .merge(panels::router())
        .route("/salidas", post(dispatches::register_dispatch))
        .route("/alertas/stock_minimo", post(alerts::send_low_stock_alert))
        .route("/dbcheck", get(system::dbcheck))
}
