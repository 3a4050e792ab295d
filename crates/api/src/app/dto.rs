use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;

use oms_core::{DomainError, DomainResult, Money};
use oms_inventory::Quantity;
use oms_parties::{ContactInfo, RegisterCustomer};
use oms_products::{CreateProduct, ProductStatus};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /api/products`. Every field is optional on the wire so
/// missing ones are reported by name.
#[derive(Debug, Default, Deserialize)]
pub struct CreateProductRequest {
    pub product_code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub status: Option<String>,
    pub initial_quantity: Option<i64>,
}

impl CreateProductRequest {
    pub fn into_command(self) -> DomainResult<CreateProduct> {
        let (Some(product_code), Some(name), Some(price)) = (self.product_code, self.name, self.price)
        else {
            return Err(DomainError::validation("product_code, name, and price are required"));
        };

        let price = Money::new(price).map_err(|e| DomainError::validation(format!("price: {}", e.detail())))?;
        let status = match self.status {
            Some(s) => ProductStatus::parse(&s)?,
            None => ProductStatus::default(),
        };
        let initial_quantity = match self.initial_quantity {
            None | Some(0) => 0,
            Some(q) => Quantity::new(q)
                .map_err(|e| DomainError::validation(format!("initial_{}", e.detail())))?
                .get(),
        };

        CreateProduct {
            product_code,
            name,
            description: self.description.unwrap_or_default(),
            price,
            status,
            initial_quantity,
        }
        .normalized()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RestockRequest {
    pub quantity: Option<i64>,
}

impl RestockRequest {
    pub fn quantity(&self) -> DomainResult<Quantity> {
        match self.quantity {
            Some(q) => Quantity::new(q),
            None => Err(DomainError::validation("quantity is required")),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterCustomerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl RegisterCustomerRequest {
    pub fn into_command(self) -> DomainResult<RegisterCustomer> {
        let name = self
            .name
            .ok_or_else(|| DomainError::validation("name is required"))?;
        RegisterCustomer {
            name,
            contact: ContactInfo {
                email: self.email,
                phone: self.phone,
            },
        }
        .normalized()
    }
}

// -------------------------
// Extraction helpers
// -------------------------

/// Unwrap a JSON body, turning framework rejections into the API's error shape.
pub fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            rejection.body_text(),
        )),
    }
}

/// Parse a path identifier into a typed id.
pub fn parse_id<T>(raw: &str, what: &str) -> Result<T, axum::response::Response>
where
    T: std::str::FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id '{raw}'"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use oms_core::ProductId;
    use rust_decimal_macros::dec;

    #[test]
    fn product_defaults_match_the_catalog_rules() {
        let cmd = CreateProductRequest {
            product_code: Some(" P-1 ".into()),
            name: Some("Widget".into()),
            price: Some(dec!(9.5)),
            ..Default::default()
        }
        .into_command()
        .unwrap();

        assert_eq!(cmd.product_code, "P-1");
        assert_eq!(cmd.description, "");
        assert_eq!(cmd.status, ProductStatus::Active);
        assert_eq!(cmd.initial_quantity, 0);
        assert_eq!(cmd.price.to_string(), "9.50");
    }

    #[test]
    fn product_requires_code_name_and_price() {
        let err = CreateProductRequest {
            name: Some("Widget".into()),
            price: Some(dec!(1)),
            ..Default::default()
        }
        .into_command()
        .unwrap_err();
        assert_eq!(err.detail(), "product_code, name, and price are required");
    }

    #[test]
    fn negative_initial_quantity_is_rejected() {
        let err = CreateProductRequest {
            product_code: Some("P".into()),
            name: Some("N".into()),
            price: Some(dec!(1)),
            initial_quantity: Some(-1),
            ..Default::default()
        }
        .into_command()
        .unwrap_err();
        assert!(err.detail().starts_with("initial_quantity"));
    }

    #[test]
    fn path_ids_must_be_positive_integers() {
        assert!(parse_id::<ProductId>("12", "product").is_ok());
        assert!(parse_id::<ProductId>("0", "product").is_err());
        assert!(parse_id::<ProductId>("abc", "product").is_err());
    }
}
