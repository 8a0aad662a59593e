use std::collections::HashMap;

use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, FromQueryResult, JoinType,
    QueryFilter, QueryOrder, QuerySelect, QueryTrait, RelationTrait, Select,
};
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartItemDto, CartList, CartProduct, ClearCartResponse},
    entity::{
        cart_items::{self, Column as CartCol, Entity as CartItems},
        product_images::{Column as ImageCol, Entity as ProductImages},
        products::Column as ProdCol,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, ImageRef},
    pricing::{MAX_LINE_QUANTITY, PricedLine, order_total},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// One cart row joined with the product's current price and title.
#[derive(Debug, Clone, PartialEq, FromQueryResult)]
pub struct CartLine {
    pub cart_item_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub title: String,
    pub price: Decimal,
}

impl PricedLine for CartLine {
    fn unit_price(&self) -> Decimal {
        self.price
    }

    fn quantity(&self) -> i32 {
        self.quantity
    }
}

fn cart_lines_select(user_id: Uuid) -> Select<CartItems> {
    CartItems::find()
        .select_only()
        .column_as(CartCol::Id, "cart_item_id")
        .column_as(CartCol::ProductId, "product_id")
        .column_as(CartCol::Quantity, "quantity")
        .column_as(ProdCol::Title, "title")
        .column_as(ProdCol::Price, "price")
        .join(JoinType::InnerJoin, cart_items::Relation::Products.def())
        .filter(CartCol::UserId.eq(user_id))
        .order_by_asc(CartCol::CreatedAt)
        .order_by_asc(CartCol::Id)
}

/// Cart reader. Rows come back oldest first; an empty cart is an empty vec.
pub async fn load_cart_lines<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<Vec<CartLine>> {
    let lines = cart_lines_select(user_id)
        .into_model::<CartLine>()
        .all(conn)
        .await?;
    Ok(lines)
}

/// Cart reader for checkout: the returned cart rows stay locked
/// (`FOR UPDATE OF cart_items`) until the transaction ends. A concurrent
/// quantity bump either lands before the read or waits for the commit.
pub async fn lock_cart_lines(txn: &DatabaseTransaction, user_id: Uuid) -> AppResult<Vec<CartLine>> {
    let mut select = cart_lines_select(user_id);
    QueryTrait::query(&mut select).lock_with_tables(LockType::Update, [CartItems]);
    let lines = select.into_model::<CartLine>().all(txn).await?;
    Ok(lines)
}

/// Image references for each product, in display order.
pub async fn load_image_refs<C: ConnectionTrait>(
    conn: &C,
    product_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<ImageRef>>> {
    let mut by_product: HashMap<Uuid, Vec<ImageRef>> = HashMap::new();
    if product_ids.is_empty() {
        return Ok(by_product);
    }

    #[derive(Debug, FromQueryResult)]
    struct ImageRow {
        id: Uuid,
        product_id: Uuid,
        url: Option<String>,
    }

    let rows = ProductImages::find()
        .select_only()
        .column(ImageCol::Id)
        .column(ImageCol::ProductId)
        .column(ImageCol::Url)
        .filter(ImageCol::ProductId.is_in(product_ids.iter().copied()))
        .order_by_asc(ImageCol::Position)
        .order_by_asc(ImageCol::CreatedAt)
        .into_model::<ImageRow>()
        .all(conn)
        .await?;

    for row in rows {
        by_product
            .entry(row.product_id)
            .or_default()
            .push(image_ref(row.id, row.url));
    }
    Ok(by_product)
}

pub fn image_ref(id: Uuid, url: Option<String>) -> ImageRef {
    ImageRef {
        id,
        url: url.unwrap_or_else(|| format!("/api/images/{id}")),
    }
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartList>> {
    let lines = load_cart_lines(&state.orm, user.user_id).await?;
    let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    let mut images = load_image_refs(&state.orm, &product_ids).await?;

    let total = order_total(&lines);
    let count = lines.len();
    let items = lines
        .into_iter()
        .map(|line| CartItemDto {
            cart_item_id: line.cart_item_id,
            product_id: line.product_id,
            quantity: line.quantity,
            product: CartProduct {
                images: images.remove(&line.product_id).unwrap_or_default(),
                title: line.title,
                price: line.price,
            },
        })
        .collect();

    Ok(ApiResponse::success(
        "OK",
        CartList { items, total },
        Some(Meta::all(count)),
    ))
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        CartItem {
            id: row.id,
            product_id: row.product_id,
            user_id: row.user_id,
            quantity: row.quantity,
            created_at: row.created_at,
        }
    }
}

/// Insert the pair, or add `quantity` onto the existing row.
///
/// The user row is held `FOR SHARE` for the duration so cart writes never
/// interleave with a running checkout, which holds it `FOR UPDATE`.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity < 1 {
        return Err(AppError::Validation(
            "quantity must be at least 1".to_string(),
        ));
    }
    if payload.quantity > MAX_LINE_QUANTITY {
        return Err(AppError::Validation(format!(
            "quantity must not exceed {MAX_LINE_QUANTITY}"
        )));
    }

    let mut tx = state.pool.begin().await?;

    let owner: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1 FOR SHARE")
        .bind(user.user_id)
        .fetch_optional(&mut *tx)
        .await?;
    if owner.is_none() {
        return Err(AppError::NotFound("User"));
    }

    let product_exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(&mut *tx)
        .await?;
    if product_exist.is_none() {
        return Err(AppError::NotFound("Product"));
    }

    // No row comes back when the increment would push past the cap.
    let row: Option<CartItemRow> = sqlx::query_as(
        r#"
        INSERT INTO cart_items (id, user_id, product_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
        WHERE cart_items.quantity <= $5 - EXCLUDED.quantity
        RETURNING id, user_id, product_id, quantity, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(payload.product_id)
    .bind(payload.quantity)
    .bind(MAX_LINE_QUANTITY)
    .fetch_optional(&mut *tx)
    .await?;
    let row = row.ok_or_else(|| {
        AppError::Validation(format!(
            "cart quantity for this product must not exceed {MAX_LINE_QUANTITY}"
        ))
    })?;

    tx.commit().await?;

    tracing::debug!(
        user_id = %user.user_id,
        product_id = %row.product_id,
        quantity = row.quantity,
        "cart item upserted"
    );

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::success("Added to cart", row.into(), None))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE product_id = $1 AND user_id = $2")
        .bind(product_id)
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Cart item"));
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_remove",
        "cart_items",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Delete exactly the given cart rows of the user.
pub async fn clear_cart_lines<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    cart_item_ids: &[Uuid],
) -> AppResult<u64> {
    let result = CartItems::delete_many()
        .filter(CartCol::UserId.eq(user_id))
        .filter(CartCol::Id.is_in(cart_item_ids.iter().copied()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Delete every cart row of the user.
pub async fn clear_cart<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<u64> {
    let result = CartItems::delete_many()
        .filter(CartCol::UserId.eq(user_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

pub async fn empty_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<ClearCartResponse>> {
    let removed = clear_cart(&state.orm, user.user_id).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_clear",
        "cart_items",
        serde_json::json!({ "removed": removed }),
    )
    .await;

    Ok(ApiResponse::success(
        "Cart cleared",
        ClearCartResponse { removed },
        Some(Meta::empty()),
    ))
}
