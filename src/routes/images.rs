use axum::{
    Router,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    services::image_service::{self, ImageSource},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", get(serve_image))
}

#[utoipa::path(
    get,
    path = "/api/images/{id}",
    params(
        ("id" = Uuid, Path, description = "Image ID")
    ),
    responses(
        (status = 200, description = "Stored image bytes"),
        (status = 303, description = "Redirect to the external image URL"),
        (status = 404, description = "Image not found"),
    ),
    tag = "Images"
)]
pub async fn serve_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let response = match image_service::find_image(&state, id).await? {
        ImageSource::Redirect(url) => Redirect::to(&url).into_response(),
        ImageSource::Blob { mimetype, data } => {
            ([(header::CONTENT_TYPE, mimetype)], data).into_response()
        }
    };
    Ok(response)
}
