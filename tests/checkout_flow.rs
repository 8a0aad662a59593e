mod common;

use ecofinds_api::{
    dto::{
        cart::AddToCartRequest,
        orders::{CheckoutRequest, Coordinates, DeliveryLocation},
        products::UpdateProductRequest,
    },
    entity::{
        audit_logs::{Column as AuditCol, Entity as AuditLogs},
        orders::{Column as OrderCol, Entity as Orders},
    },
    error::AppError,
    middleware::auth::AuthUser,
    services::{cart_service, order_service, product_service},
    state::AppState,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use std::time::Duration;
use uuid::Uuid;

async fn add(state: &AppState, user: &AuthUser, product_id: Uuid, quantity: i32) -> anyhow::Result<()> {
    cart_service::add_to_cart(state, user, AddToCartRequest { product_id, quantity }).await?;
    Ok(())
}

async fn order_count(state: &AppState, user: &AuthUser) -> anyhow::Result<u64> {
    Ok(Orders::find()
        .filter(OrderCol::UserId.eq(user.user_id))
        .count(&state.orm)
        .await?)
}

fn location() -> DeliveryLocation {
    DeliveryLocation {
        address: "12 Green Lane".into(),
        city: "Pune".into(),
        state: "MH".into(),
        postal_code: "411001".into(),
        country: "India".into(),
        coordinates: Coordinates {
            lat: 18.5204303,
            lng: 73.8567437,
        },
    }
}

#[tokio::test]
async fn checkout_snapshots_cart_and_clears_it() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;
    let buyer = common::create_user(&state).await?;
    let bottle = common::create_product(&state, &seller, "Bottle", dec!(19.99)).await?;
    let straw = common::create_product(&state, &seller, "Straw", dec!(0.10)).await?;
    add(&state, &buyer, bottle, 3).await?;
    add(&state, &buyer, straw, 7).await?;

    let created = order_service::checkout(&state, &buyer, CheckoutRequest::default())
        .await?
        .data
        .unwrap();

    assert_eq!(created.order.total_amount, dec!(60.67));
    assert_eq!(created.items.len(), 2);
    let line_sum: Decimal = created
        .items
        .iter()
        .map(|i| i.price * Decimal::from(i.quantity))
        .sum();
    assert_eq!(line_sum, created.order.total_amount);
    assert!(created.order.delivery.is_none());

    let cart = cart_service::get_cart(&state, &buyer).await?.data.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(order_count(&state, &buyer).await?, 1);

    let audits = AuditLogs::find()
        .filter(AuditCol::UserId.eq(buyer.user_id))
        .filter(AuditCol::Action.eq("checkout"))
        .count(&state.orm)
        .await?;
    assert_eq!(audits, 1);
    Ok(())
}

#[tokio::test]
async fn empty_cart_checkout_creates_nothing() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let buyer = common::create_user(&state).await?;

    let err = order_service::checkout(&state, &buyer, CheckoutRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::EmptyCart));
    assert_eq!(order_count(&state, &buyer).await?, 0);
    Ok(())
}

#[tokio::test]
async fn delivery_location_is_stored_on_the_order() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;
    let buyer = common::create_user(&state).await?;
    let product = common::create_product(&state, &seller, "Tote", dec!(249.50)).await?;
    add(&state, &buyer, product, 1).await?;

    let created = order_service::checkout(
        &state,
        &buyer,
        CheckoutRequest {
            delivery_location: Some(location()),
        },
    )
    .await?
    .data
    .unwrap();

    let delivery = created.order.delivery.expect("delivery stored");
    assert_eq!(delivery.city.as_deref(), Some("Pune"));
    assert_eq!(delivery.postal_code.as_deref(), Some("411001"));
    assert_eq!(delivery.latitude, Some(dec!(18.5204303)));
    assert_eq!(delivery.longitude, Some(dec!(73.8567437)));
    Ok(())
}

#[tokio::test]
async fn invalid_delivery_location_is_rejected_before_any_write() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;
    let buyer = common::create_user(&state).await?;
    let product = common::create_product(&state, &seller, "Comb", dec!(99.00)).await?;
    add(&state, &buyer, product, 1).await?;

    let mut bad = location();
    bad.country = " ".into();
    let err = order_service::checkout(
        &state,
        &buyer,
        CheckoutRequest {
            delivery_location: Some(bad),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(order_count(&state, &buyer).await?, 0);
    assert_eq!(cart_service::get_cart(&state, &buyer).await?.data.unwrap().items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn price_changes_do_not_touch_past_orders() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;
    let buyer = common::create_user(&state).await?;
    let product = common::create_product(&state, &seller, "Speaker", dec!(1499.00)).await?;
    add(&state, &buyer, product, 2).await?;

    let created = order_service::checkout(&state, &buyer, CheckoutRequest::default())
        .await?
        .data
        .unwrap();

    product_service::update_product(
        &state,
        &seller,
        product,
        UpdateProductRequest {
            price: Some(dec!(999.00)),
            ..Default::default()
        },
    )
    .await?;

    let fetched = order_service::get_order(&state, &buyer, created.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(fetched.items[0].price, dec!(1499.00));
    assert_eq!(fetched.order.total_amount, dec!(2998.00));

    let history = order_service::order_history(&state, &buyer).await?.data.unwrap();
    let line = &history.items[0].items[0];
    assert_eq!(line.item.price, dec!(1499.00));
    assert_eq!(line.product.as_ref().unwrap().current_price, dec!(999.00));
    Ok(())
}

#[tokio::test]
async fn removed_items_are_not_ordered() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;
    let buyer = common::create_user(&state).await?;
    let a = common::create_product(&state, &seller, "Product A", dec!(10.00)).await?;
    let b = common::create_product(&state, &seller, "Product B", dec!(20.00)).await?;
    add(&state, &buyer, a, 1).await?;
    add(&state, &buyer, b, 1).await?;
    cart_service::remove_from_cart(&state, &buyer, a).await?;

    let created = order_service::checkout(&state, &buyer, CheckoutRequest::default())
        .await?
        .data
        .unwrap();
    assert_eq!(created.items.len(), 1);
    assert_eq!(created.items[0].product_id, Some(b));
    assert_eq!(created.order.total_amount, dec!(20.00));
    Ok(())
}

#[tokio::test]
async fn history_is_newest_first_with_products() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;
    let buyer = common::create_user(&state).await?;
    let first = common::create_product(&state, &seller, "First", dec!(5.00)).await?;
    let second = common::create_product(&state, &seller, "Second", dec!(7.00)).await?;

    add(&state, &buyer, first, 1).await?;
    let older = order_service::checkout(&state, &buyer, CheckoutRequest::default())
        .await?
        .data
        .unwrap();
    add(&state, &buyer, second, 2).await?;
    let newer = order_service::checkout(&state, &buyer, CheckoutRequest::default())
        .await?
        .data
        .unwrap();

    let history = order_service::order_history(&state, &buyer).await?.data.unwrap();
    let ids: Vec<Uuid> = history.items.iter().map(|o| o.order.id).collect();
    assert_eq!(ids, vec![newer.order.id, older.order.id]);
    assert_eq!(history.items[0].items[0].product.as_ref().unwrap().title, "Second");

    // Other users cannot read the order.
    let stranger = common::create_user(&state).await?;
    let err = order_service::get_order(&state, &stranger, newer.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_produce_one_order() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;
    let buyer = common::create_user(&state).await?;
    let product = common::create_product(&state, &seller, "Hoodie", dec!(550.00)).await?;
    add(&state, &buyer, product, 2).await?;

    let (left, right) = {
        let (s1, s2) = (state.clone(), state.clone());
        let (u1, u2) = (buyer.clone(), buyer.clone());
        tokio::join!(
            tokio::spawn(async move {
                order_service::checkout(&s1, &u1, CheckoutRequest::default()).await
            }),
            tokio::spawn(async move {
                order_service::checkout(&s2, &u2, CheckoutRequest::default()).await
            }),
        )
    };
    let results = [left?, right?];

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let empty = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::EmptyCart)))
        .count();
    assert_eq!(succeeded, 1);
    assert_eq!(empty, 1);
    assert_eq!(order_count(&state, &buyer).await?, 1);
    assert!(cart_service::get_cart(&state, &buyer).await?.data.unwrap().items.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn quantity_bump_committed_during_checkout_is_ordered() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;
    let buyer = common::create_user(&state).await?;
    let product = common::create_product(&state, &seller, "Beeswax Wraps", dec!(10.00)).await?;
    add(&state, &buyer, product, 2).await?;

    // Another session bumps the line and holds the row until commit.
    let mut bump = state.pool.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO cart_items (id, user_id, product_id, quantity)
        VALUES ($1, $2, $3, 3)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(buyer.user_id)
    .bind(product)
    .execute(&mut *bump)
    .await?;

    let checkout = {
        let (s, u) = (state.clone(), buyer.clone());
        tokio::spawn(async move { order_service::checkout(&s, &u, CheckoutRequest::default()).await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!checkout.is_finished());
    bump.commit().await?;

    let placed = checkout.await??.data.unwrap();
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].quantity, 5);
    assert_eq!(placed.order.total_amount, dec!(50.00));
    assert!(cart_service::get_cart(&state, &buyer).await?.data.unwrap().items.is_empty());
    Ok(())
}

#[tokio::test]
async fn total_beyond_storable_range_is_a_validation_error() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;
    let buyer = common::create_user(&state).await?;
    let product =
        common::create_product(&state, &seller, "Vintage Tractor", dec!(99999999.99)).await?;
    add(&state, &buyer, product, 200).await?;

    let err = order_service::checkout(&state, &buyer, CheckoutRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(msg) if msg.contains("exceeds")));
    assert_eq!(order_count(&state, &buyer).await?, 0);
    let cart = cart_service::get_cart(&state, &buyer).await?.data.unwrap();
    assert_eq!(cart.items[0].quantity, 200);
    Ok(())
}

#[tokio::test]
async fn failure_after_order_insert_leaves_no_order_and_keeps_cart() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;
    let buyer = common::create_user(&state).await?;
    let first = common::create_product(&state, &seller, "Cork Board", dec!(12.00)).await?;
    let second = common::create_product(&state, &seller, "Hemp Rope", dec!(4.50)).await?;
    add(&state, &buyer, first, 1).await?;
    add(&state, &buyer, second, 4).await?;

    // Reject the second order line so the failure lands after the order row
    // and the first line are written.
    let tag = Uuid::new_v4().simple().to_string();
    let function = format!("reject_line_{tag}");
    let trigger = format!("reject_line_trg_{tag}");
    sqlx::query(&format!(
        r#"
        CREATE FUNCTION {function}() RETURNS trigger AS $$
        BEGIN
            IF NEW.product_id = '{second}' THEN
                RAISE EXCEPTION 'order line rejected';
            END IF;
            RETURN NEW;
        END
        $$ LANGUAGE plpgsql
        "#
    ))
    .execute(&state.pool)
    .await?;
    sqlx::query(&format!(
        "CREATE TRIGGER {trigger} BEFORE INSERT ON order_items \
         FOR EACH ROW EXECUTE FUNCTION {function}()"
    ))
    .execute(&state.pool)
    .await?;

    let result = order_service::checkout(&state, &buyer, CheckoutRequest::default()).await;

    sqlx::query(&format!("DROP TRIGGER {trigger} ON order_items"))
        .execute(&state.pool)
        .await?;
    sqlx::query(&format!("DROP FUNCTION {function}()"))
        .execute(&state.pool)
        .await?;

    assert!(matches!(result, Err(AppError::OrmError(_))));
    assert_eq!(order_count(&state, &buyer).await?, 0);
    let cart = cart_service::get_cart(&state, &buyer).await?.data.unwrap();
    let mut lines: Vec<(Uuid, i32)> = cart.items.iter().map(|i| (i.product_id, i.quantity)).collect();
    lines.sort();
    let mut expected = vec![(first, 1), (second, 4)];
    expected.sort();
    assert_eq!(lines, expected);
    Ok(())
}
