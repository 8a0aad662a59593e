use sea_orm::{EntityTrait, QueryOrder};

use crate::{
    entity::categories::{Column, Entity as Categories},
    error::AppResult,
    models::Category,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<Vec<Category>>> {
    let items: Vec<Category> = Categories::find()
        .order_by_asc(Column::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|c| Category { id: c.id, name: c.name })
        .collect();
    let meta = Meta::all(items.len());
    Ok(ApiResponse::success("Categories", items, Some(meta)))
}
