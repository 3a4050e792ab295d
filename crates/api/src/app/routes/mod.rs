use axum::{Router, routing::get};

pub mod customers;
pub mod orders;
pub mod products;
pub mod system;

/// Router for everything mounted under `/api`.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/products", products::router())
        .nest("/customers", customers::router())
        .nest("/orders", orders::router())
}
