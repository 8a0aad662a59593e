use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{error::AppError, models::Product, pricing::price_ceiling};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub title: String,
    pub description: String,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub quantity: i32,
    pub condition: String,
    pub brand: Option<String>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub quantity: Option<i32>,
    pub condition: Option<String>,
    pub brand: Option<String>,
    pub category_id: Option<Uuid>,
}

#[derive(Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}

pub(crate) fn check_title(title: &str) -> Result<(), AppError> {
    if title.trim().chars().count() < 3 {
        return Err(AppError::Validation(
            "title must be at least 3 characters".into(),
        ));
    }
    Ok(())
}

pub(crate) fn check_description(description: &str) -> Result<(), AppError> {
    if description.trim().chars().count() < 10 {
        return Err(AppError::Validation(
            "description must be at least 10 characters".into(),
        ));
    }
    Ok(())
}

pub(crate) fn check_price(price: Decimal) -> Result<(), AppError> {
    if price <= Decimal::ZERO {
        return Err(AppError::Validation("price must be positive".into()));
    }
    if price >= price_ceiling() {
        return Err(AppError::Validation(format!(
            "price must be below {}",
            price_ceiling()
        )));
    }
    if price.scale() > 2 {
        return Err(AppError::Validation(
            "price must have at most 2 decimal places".into(),
        ));
    }
    Ok(())
}

pub(crate) fn check_quantity(quantity: i32) -> Result<(), AppError> {
    if quantity < 0 {
        return Err(AppError::Validation("quantity must not be negative".into()));
    }
    Ok(())
}

pub(crate) fn check_condition(condition: &str) -> Result<(), AppError> {
    if condition.trim().chars().count() < 3 {
        return Err(AppError::Validation(
            "condition must be at least 3 characters".into(),
        ));
    }
    Ok(())
}

impl CreateProductRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        check_title(&self.title)?;
        check_description(&self.description)?;
        check_price(self.price)?;
        check_quantity(self.quantity)?;
        check_condition(&self.condition)?;
        if self.image_urls.len() > 5 {
            return Err(AppError::Validation("at most 5 images per product".into()));
        }
        if let Some(bad) = self
            .image_urls
            .iter()
            .find(|u| !(u.starts_with("http://") || u.starts_with("https://")))
        {
            return Err(AppError::Validation(format!("invalid image url: {bad}")));
        }
        Ok(())
    }
}

impl UpdateProductRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            check_title(title)?;
        }
        if let Some(description) = &self.description {
            check_description(description)?;
        }
        if let Some(price) = self.price {
            check_price(price)?;
        }
        if let Some(quantity) = self.quantity {
            check_quantity(quantity)?;
        }
        if let Some(condition) = &self.condition {
            check_condition(condition)?;
        }
        Ok(())
    }
}
