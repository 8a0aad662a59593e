use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{DeliveryAddress, Order, OrderItem},
};

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryLocation {
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub coordinates: Coordinates,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub delivery_location: Option<DeliveryLocation>,
}

impl DeliveryLocation {
    /// Validate the payload and convert it into the stored address shape.
    pub fn into_address(self) -> Result<DeliveryAddress, AppError> {
        let fields = [
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(AppError::Validation(format!("{name} must not be blank")));
        }

        let latitude = coordinate("lat", self.coordinates.lat, 90.0)?;
        let longitude = coordinate("lng", self.coordinates.lng, 180.0)?;

        Ok(DeliveryAddress {
            address: Some(self.address.trim().to_string()),
            city: Some(self.city.trim().to_string()),
            state: Some(self.state.trim().to_string()),
            postal_code: Some(self.postal_code.trim().to_string()),
            country: Some(self.country.trim().to_string()),
            latitude: Some(latitude),
            longitude: Some(longitude),
        })
    }
}

fn coordinate(name: &str, value: f64, bound: f64) -> Result<Decimal, AppError> {
    if !value.is_finite() || value.abs() > bound {
        return Err(AppError::Validation(format!(
            "coordinates.{name} must be within ±{bound}"
        )));
    }
    Decimal::try_from(value)
        .map(|d| d.round_dp(7))
        .map_err(|_| AppError::Validation(format!("coordinates.{name} is not representable")))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Current catalog view of the product an order line points at.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderedProduct {
    pub id: Uuid,
    pub title: String,
    #[schema(value_type = String)]
    pub current_price: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryItem {
    #[serde(flatten)]
    pub item: OrderItem,
    pub product: Option<OrderedProduct>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryOrder {
    pub order: Order,
    pub items: Vec<HistoryItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderHistory {
    pub items: Vec<HistoryOrder>,
}
