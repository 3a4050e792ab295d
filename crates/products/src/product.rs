use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use oms_core::{DomainError, DomainResult, Entity, Money, ProductId};

/// Longest accepted business code (matches the `product_code` column).
pub const MAX_CODE_LEN: usize = 64;
/// Longest accepted display name (matches the `name` column).
pub const MAX_NAME_LEN: usize = 255;

/// Product lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "ACTIVE",
            ProductStatus::Inactive => "INACTIVE",
        }
    }

    /// Parse a stored or caller-supplied status (case-insensitive).
    pub fn parse(s: &str) -> DomainResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(ProductStatus::Active),
            "INACTIVE" => Ok(ProductStatus::Inactive),
            other => Err(DomainError::validation(format!(
                "status must be one of: ACTIVE, INACTIVE (got '{other}')"
            ))),
        }
    }
}

/// A catalog product.
///
/// `price` is the current catalog price; orders snapshot it into their line
/// items, so later edits never change existing orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub product_code: String,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Check if product is offered in the storefront listing.
    pub fn is_listed(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Product joined with its available stock, as listed to the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub product: Product,
    /// Available quantity (0 when the product has no inventory record).
    pub quantity: i64,
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProduct {
    pub product_code: String,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub status: ProductStatus,
    /// Quantity the inventory record starts with.
    pub initial_quantity: u32,
}

impl CreateProduct {
    /// Trim text fields and check them against the catalog rules.
    ///
    /// Uniqueness of `product_code` is enforced by the store.
    pub fn normalized(self) -> DomainResult<Self> {
        let product_code = self.product_code.trim().to_string();
        let name = self.name.trim().to_string();

        if product_code.is_empty() {
            return Err(DomainError::validation("product_code cannot be empty"));
        }
        if product_code.len() > MAX_CODE_LEN {
            return Err(DomainError::validation(format!(
                "product_code cannot exceed {MAX_CODE_LEN} characters"
            )));
        }
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(DomainError::validation(format!(
                "name cannot exceed {MAX_NAME_LEN} characters"
            )));
        }

        Ok(Self {
            product_code,
            name,
            description: self.description.trim().to_string(),
            ..self
        })
    }
}
