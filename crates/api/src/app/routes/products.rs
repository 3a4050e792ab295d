use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use oms_core::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id/restock", post(restock_product))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.list_products().await {
        Ok(products) => Json(products).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::parse_body(body) {
        Ok(b) => b,
        Err(res) => return res,
    };
    let cmd = match body.into_command() {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.create_product(cmd).await {
        Ok(entry) => {
            tracing::info!(product_id = entry.product.id.get(), product_code = %entry.product.product_code, "product created");
            (StatusCode::CREATED, Json(entry)).into_response()
        }
        Err(oms_infra::StoreError::Conflict(_)) => errors::json_error(
            StatusCode::CONFLICT,
            "conflict",
            "product_code must be unique",
        ),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn restock_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::RestockRequest>, JsonRejection>,
) -> axum::response::Response {
    let product_id: ProductId = match dto::parse_id(&id, "product") {
        Ok(v) => v,
        Err(res) => return res,
    };
    let body = match dto::parse_body(body) {
        Ok(b) => b,
        Err(res) => return res,
    };
    let quantity = match body.quantity() {
        Ok(q) => q,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.restock(product_id, quantity).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("product {product_id} does not exist"),
        ),
        Err(e) => errors::store_error_to_response(e),
    }
}
