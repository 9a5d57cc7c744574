use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDto {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub slug: String,
    pub inventory: i32,
    #[schema(value_type = String)]
    pub unit_price: Decimal,
    #[schema(value_type = String)]
    pub price_with_tax: Decimal,
    pub collection: i32,
}

/// Product shape nested inside cart and order items.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct SimpleProductDto {
    pub id: i32,
    #[schema(value_type = String)]
    pub unit_price: Decimal,
    pub title: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 255))]
    pub slug: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = String)]
    #[validate(custom(function = "validate_unit_price"))]
    pub unit_price: Decimal,
    #[validate(range(min = 0))]
    pub inventory: i32,
    pub collection: i32,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub slug: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    #[validate(custom(function = "validate_unit_price"))]
    pub unit_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub inventory: Option<i32>,
    pub collection: Option<i32>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<ProductDto>)]
    pub items: Vec<ProductDto>,
}

/// Prices are stored as numeric(6, 2) and must be at least 1.
fn validate_unit_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price < Decimal::ONE {
        return Err(ValidationError::new("min_unit_price"));
    }
    if price.scale() > 2 || *price >= Decimal::new(10_000, 0) {
        return Err(ValidationError::new("unit_price_precision"));
    }
    Ok(())
}
