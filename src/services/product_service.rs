use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, JoinType,
    LoaderTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::{
        categories::{Column as CategoryCol, Entity as Categories, Model as CategoryModel},
        product_images::ActiveModel as ImageActive,
        products::{self, ActiveModel, Column, Entity as Products, Model as ProductModel},
        users::{Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Category, ImageRef, Product, Seller},
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
    services::cart_service::load_image_refs,
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let mut condition = Condition::all();

    if let Some(search) = query.search.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col((Products, Column::Title)).ilike(pattern.clone()))
                .add(Expr::col((Products, Column::Description)).ilike(pattern)),
        );
    }

    let mut finder = Products::find();
    if let Some(category) = query.category.as_ref().filter(|c| !c.is_empty()) {
        finder = finder
            .join(JoinType::InnerJoin, products::Relation::Category.def())
            .filter(CategoryCol::Name.eq(category.clone()));
    }

    let models = finder
        .filter(condition)
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?;

    let mut items = hydrate(&state.orm, models).await?;
    // Listings only carry the cover image.
    for item in &mut items {
        item.images.truncate(1);
    }

    let meta = Meta::all(items.len());
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let model = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    let product = hydrate(&state.orm, vec![model])
        .await?
        .pop()
        .ok_or(AppError::NotFound("Product"))?;
    Ok(ApiResponse::success("Product", product, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    payload.validate()?;
    if let Some(category_id) = payload.category_id {
        ensure_category(&state.orm, category_id).await?;
    }

    let txn = state.orm.begin().await?;
    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        seller_id: Set(user.user_id),
        category_id: Set(payload.category_id),
        title: Set(payload.title.trim().to_string()),
        description: Set(payload.description.trim().to_string()),
        price: Set(payload.price),
        quantity: Set(payload.quantity),
        condition: Set(payload.condition.trim().to_string()),
        brand: Set(payload.brand),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    for (position, url) in payload.image_urls.into_iter().enumerate() {
        ImageActive {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            position: Set(position as i32),
            url: Set(Some(url)),
            image_data: Set(None),
            mimetype: Set(None),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
    }
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    let product = hydrate(&state.orm, vec![product])
        .await?
        .pop()
        .ok_or(AppError::NotFound("Product"))?;
    Ok(ApiResponse::success(
        "Product created",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    payload.validate()?;
    let existing = owned_product(state, user, id).await?;
    if let Some(category_id) = payload.category_id {
        ensure_category(&state.orm, category_id).await?;
    }

    let mut active: ActiveModel = existing.into();
    if let Some(title) = payload.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(description.trim().to_string());
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(quantity) = payload.quantity {
        active.quantity = Set(quantity);
    }
    if let Some(condition) = payload.condition {
        active.condition = Set(condition.trim().to_string());
    }
    if let Some(brand) = payload.brand {
        active.brand = Set(Some(brand));
    }
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(Some(category_id));
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    let product = hydrate(&state.orm, vec![product])
        .await?
        .pop()
        .ok_or(AppError::NotFound("Product"))?;
    Ok(ApiResponse::success("Updated", product, Some(Meta::empty())))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    owned_product(state, user, id).await?;
    Products::delete_by_id(id).exec(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn owned_product(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ProductModel> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    if product.seller_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    Ok(product)
}

async fn ensure_category<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<()> {
    Categories::find_by_id(id)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or(AppError::NotFound("Category"))
}

/// Attach category, seller summary and images to product rows, keeping order.
async fn hydrate<C: ConnectionTrait>(conn: &C, models: Vec<ProductModel>) -> AppResult<Vec<Product>> {
    let categories: Vec<Option<CategoryModel>> = models.load_one(Categories, conn).await?;
    let sellers: Vec<Option<UserModel>> = models.load_one(Users, conn).await?;
    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let mut images = load_image_refs(conn, &ids).await?;

    let products = models
        .into_iter()
        .zip(categories)
        .zip(sellers)
        .map(|((model, category), seller)| {
            let product_images: Vec<ImageRef> = images.remove(&model.id).unwrap_or_default();
            Product {
                id: model.id,
                title: model.title,
                description: model.description,
                price: model.price,
                quantity: model.quantity,
                condition: model.condition,
                brand: model.brand,
                category: category.map(|c| Category { id: c.id, name: c.name }),
                seller: seller.map(|u| Seller {
                    id: u.id,
                    username: u.username,
                }),
                images: product_images,
                created_at: model.created_at.with_timezone(&Utc),
            }
        })
        .collect();
    Ok(products)
}
