use sea_orm::EntityTrait;
use uuid::Uuid;

use crate::{
    entity::product_images::{Entity as ProductImages, Model as ImageModel},
    error::{AppError, AppResult},
    state::AppState,
};

/// How an image is delivered to the client.
#[derive(Debug, PartialEq)]
pub enum ImageSource {
    Redirect(String),
    Blob { mimetype: String, data: Vec<u8> },
}

impl ImageSource {
    /// External URLs win over stored blobs; a row with neither is missing.
    pub fn from_model(model: ImageModel) -> Option<Self> {
        if let Some(url) = model.url.filter(|u| !u.is_empty()) {
            return Some(ImageSource::Redirect(url));
        }
        match (model.image_data, model.mimetype) {
            (Some(data), Some(mimetype)) => Some(ImageSource::Blob { mimetype, data }),
            _ => None,
        }
    }
}

pub async fn find_image(state: &AppState, id: Uuid) -> AppResult<ImageSource> {
    ProductImages::find_by_id(id)
        .one(&state.orm)
        .await?
        .and_then(ImageSource::from_model)
        .ok_or(AppError::NotFound("Image"))
}
