mod common;

use ecofinds_api::{
    dto::cart::AddToCartRequest,
    error::AppError,
    pricing::MAX_LINE_QUANTITY,
    services::cart_service,
};
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn repeated_add_accumulates_into_one_row() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;
    let buyer = common::create_user(&state).await?;
    let product = common::create_product(&state, &seller, "Jute Tote", dec!(249.50)).await?;

    cart_service::add_to_cart(&state, &buyer, AddToCartRequest { product_id: product, quantity: 2 }).await?;
    let second = cart_service::add_to_cart(
        &state,
        &buyer,
        AddToCartRequest { product_id: product, quantity: 3 },
    )
    .await?;
    assert_eq!(second.data.unwrap().quantity, 5);

    let cart = cart_service::get_cart(&state, &buyer).await?.data.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].product_id, product);
    assert_eq!(cart.items[0].quantity, 5);
    assert_eq!(cart.items[0].product.price, dec!(249.50));
    assert_eq!(cart.total, dec!(1247.50));
    Ok(())
}

#[tokio::test]
async fn reading_the_cart_twice_is_stable() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;
    let buyer = common::create_user(&state).await?;
    for (title, price) in [("Comb", dec!(99.00)), ("Bottle", dec!(599.00)), ("Soap", dec!(45.25))] {
        let id = common::create_product(&state, &seller, title, price).await?;
        cart_service::add_to_cart(&state, &buyer, AddToCartRequest { product_id: id, quantity: 1 }).await?;
    }

    let first = cart_service::get_cart(&state, &buyer).await?.data.unwrap();
    let second = cart_service::get_cart(&state, &buyer).await?.data.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.items.len(), 3);
    Ok(())
}

#[tokio::test]
async fn empty_cart_reads_as_empty_list() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let buyer = common::create_user(&state).await?;

    let cart = cart_service::get_cart(&state, &buyer).await?.data.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.total, dec!(0));
    Ok(())
}

#[tokio::test]
async fn removing_a_missing_item_is_not_found() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let buyer = common::create_user(&state).await?;

    let err = cart_service::remove_from_cart(&state, &buyer, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn add_rejects_bad_quantity_and_unknown_product() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;
    let buyer = common::create_user(&state).await?;
    let product = common::create_product(&state, &seller, "Speaker", dec!(1499.00)).await?;

    let err = cart_service::add_to_cart(&state, &buyer, AddToCartRequest { product_id: product, quantity: 0 })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = cart_service::add_to_cart(
        &state,
        &buyer,
        AddToCartRequest { product_id: Uuid::new_v4(), quantity: 1 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound("Product")));

    let cart = cart_service::get_cart(&state, &buyer).await?.data.unwrap();
    assert!(cart.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn clearing_only_touches_the_callers_cart() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;
    let alice = common::create_user(&state).await?;
    let bob = common::create_user(&state).await?;
    let product = common::create_product(&state, &seller, "Mug", dec!(120.00)).await?;

    for user in [&alice, &bob] {
        cart_service::add_to_cart(&state, user, AddToCartRequest { product_id: product, quantity: 1 }).await?;
    }

    let cleared = cart_service::empty_cart(&state, &alice).await?.data.unwrap();
    assert_eq!(cleared.removed, 1);

    assert!(cart_service::get_cart(&state, &alice).await?.data.unwrap().items.is_empty());
    assert_eq!(cart_service::get_cart(&state, &bob).await?.data.unwrap().items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn line_quantity_is_capped() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;
    let buyer = common::create_user(&state).await?;
    let product = common::create_product(&state, &seller, "Seed Packet", dec!(5.00)).await?;

    let err = cart_service::add_to_cart(
        &state,
        &buyer,
        AddToCartRequest { product_id: product, quantity: 2_000_000_000 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    cart_service::add_to_cart(
        &state,
        &buyer,
        AddToCartRequest { product_id: product, quantity: MAX_LINE_QUANTITY },
    )
    .await?;
    let err = cart_service::add_to_cart(
        &state,
        &buyer,
        AddToCartRequest { product_id: product, quantity: 1 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(msg) if msg.contains("exceed")));

    let cart = cart_service::get_cart(&state, &buyer).await?.data.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, MAX_LINE_QUANTITY);
    Ok(())
}
