use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::ImageRef;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CartProduct {
    pub title: String,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub images: Vec<ImageRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItemDto {
    pub cart_item_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub product: CartProduct,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CartList {
    pub items: Vec<CartItemDto>,
    #[schema(value_type = String)]
    pub total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClearCartResponse {
    pub removed: u64,
}
