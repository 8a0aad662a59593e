use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, EntityTrait, LoaderTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{
        CheckoutRequest, HistoryItem, HistoryOrder, OrderHistory, OrderWithItems, OrderedProduct,
    },
    entity::{
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::Entity as Products,
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{DeliveryAddress, Order, OrderItem},
    pricing::{max_order_total, order_total},
    response::{ApiResponse, Meta},
    services::cart_service::{CartLine, clear_cart_lines, lock_cart_lines},
    state::AppState,
};

/// Turn the caller's cart into an order.
///
/// Everything runs in one transaction. The user row is locked first so
/// concurrent checkouts and cart writes for the same user queue up behind
/// it, and the cart rows read are locked until commit. The order, its items
/// and the removal of exactly those cart rows commit together or not at all.
/// A checkout that waited on the lock sees the already-cleared cart and
/// fails with [`AppError::EmptyCart`].
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let delivery = payload
        .delivery_location
        .map(|loc| loc.into_address())
        .transpose()?;

    let txn = state.orm.begin().await?;
    let built = build_order(&txn, user.user_id, delivery).await;
    let (order, items) = match built {
        Ok(built) => built,
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::warn!(error = %rollback_err, "checkout rollback failed");
            }
            return Err(err);
        }
    };
    txn.commit().await?;

    tracing::info!(
        user_id = %user.user_id,
        order_id = %order.id,
        total = %order.total_amount,
        items = items.len(),
        "order created"
    );

    audit::record(
        &state.pool,
        Some(user.user_id),
        "checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_amount": order.total_amount }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems {
            order: order_from_entity(order),
            items: items.into_iter().map(order_item_from_entity).collect(),
        },
        Some(Meta::empty()),
    ))
}

async fn build_order(
    txn: &DatabaseTransaction,
    user_id: Uuid,
    delivery: Option<DeliveryAddress>,
) -> AppResult<(OrderModel, Vec<OrderItemModel>)> {
    // Per-user mutex for the lifetime of the transaction.
    Users::find_by_id(user_id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    let lines = lock_cart_lines(txn, user_id).await?;
    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let total_amount = order_total(&lines);
    if total_amount > max_order_total() {
        return Err(AppError::Validation(format!(
            "order total {total_amount} exceeds the maximum of {}",
            max_order_total()
        )));
    }
    let delivery = delivery.unwrap_or_default();

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        total_amount: Set(total_amount),
        order_date: Set(Utc::now().into()),
        delivery_address: Set(delivery.address),
        delivery_city: Set(delivery.city),
        delivery_state: Set(delivery.state),
        delivery_postal_code: Set(delivery.postal_code),
        delivery_country: Set(delivery.country),
        delivery_latitude: Set(delivery.latitude),
        delivery_longitude: Set(delivery.longitude),
    }
    .insert(txn)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        items.push(snapshot_line(txn, order.id, line).await?);
    }

    let ids: Vec<Uuid> = lines.iter().map(|l| l.cart_item_id).collect();
    let cleared = clear_cart_lines(txn, user_id, &ids).await?;
    if cleared != lines.len() as u64 {
        return Err(AppError::Internal(anyhow::anyhow!(
            "cart changed during checkout: read {} rows, cleared {}",
            lines.len(),
            cleared
        )));
    }

    Ok((order, items))
}

/// Copy the product's current price into a permanent order line.
async fn snapshot_line(
    txn: &DatabaseTransaction,
    order_id: Uuid,
    line: &CartLine,
) -> AppResult<OrderItemModel> {
    let item = OrderItemActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        product_id: Set(Some(line.product_id)),
        quantity: Set(line.quantity),
        price: Set(line.price),
    }
    .insert(txn)
    .await?;
    Ok(item)
}

/// All orders of the caller, newest first, each with its lines and the
/// product each line references (if it still exists).
pub async fn order_history(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderHistory>> {
    let orders = Orders::find()
        .filter(OrderCol::UserId.eq(user.user_id))
        .order_by_desc(OrderCol::OrderDate)
        .order_by_desc(OrderCol::Id)
        .all(&state.orm)
        .await?;

    let items_per_order = orders.load_many(OrderItems, &state.orm).await?;

    let product_ids: Vec<Uuid> = items_per_order
        .iter()
        .flatten()
        .filter_map(|item| item.product_id)
        .collect();
    let products: HashMap<Uuid, OrderedProduct> = if product_ids.is_empty() {
        HashMap::new()
    } else {
        Products::find()
            .filter(crate::entity::products::Column::Id.is_in(product_ids))
            .all(&state.orm)
            .await?
            .into_iter()
            .map(|p| {
                (
                    p.id,
                    OrderedProduct {
                        id: p.id,
                        title: p.title,
                        current_price: p.price,
                    },
                )
            })
            .collect()
    };

    let count = orders.len();
    let entries = orders
        .into_iter()
        .zip(items_per_order)
        .map(|(order, items)| HistoryOrder {
            order: order_from_entity(order),
            items: items
                .into_iter()
                .map(|item| {
                    let product = item.product_id.and_then(|id| products.get(&id)).cloned();
                    HistoryItem {
                        item: order_item_from_entity(item),
                        product,
                    }
                })
                .collect(),
        })
        .collect();

    Ok(ApiResponse::success(
        "Order history",
        OrderHistory { items: entries },
        Some(Meta::all(count)),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Order"))?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

fn order_from_entity(model: OrderModel) -> Order {
    let has_delivery = model.delivery_address.is_some()
        || model.delivery_latitude.is_some()
        || model.delivery_longitude.is_some();
    let delivery = has_delivery.then(|| DeliveryAddress {
        address: model.delivery_address,
        city: model.delivery_city,
        state: model.delivery_state,
        postal_code: model.delivery_postal_code,
        country: model.delivery_country,
        latitude: model.delivery_latitude,
        longitude: model.delivery_longitude,
    });
    Order {
        id: model.id,
        user_id: model.user_id,
        total_amount: model.total_amount,
        order_date: model.order_date.with_timezone(&Utc),
        delivery,
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
    }
}
