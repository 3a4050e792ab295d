use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use oms_core::OrderId;
use oms_sales::{OrderReadView, PlaceOrderRequest};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/:id", get(get_order))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::parse_body(body) {
        Ok(b) => b,
        Err(res) => return res,
    };

    match services.place_order(body).await {
        Ok(details) => (StatusCode::CREATED, Json(details)).into_response(),
        Err(e) => errors::placement_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match dto::parse_id(&id, "order") {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.get_order(order_id).await {
        Ok(Some(details)) => Json(OrderReadView::from(details)).into_response(),
        Ok(None) => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("order {order_id} not found"),
        ),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.list_orders().await {
        Ok(orders) => Json(orders).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
