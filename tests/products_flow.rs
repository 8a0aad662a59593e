mod common;

use ecofinds_api::{
    dto::products::{CreateProductRequest, UpdateProductRequest},
    entity::product_images::ActiveModel as ImageActive,
    error::AppError,
    routes::params::ProductQuery,
    services::{
        image_service::{self, ImageSource},
        product_service,
    },
};
use rust_decimal_macros::dec;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

fn listing(title: &str) -> CreateProductRequest {
    CreateProductRequest {
        title: title.to_string(),
        description: "Gently used and cleaned, ready for a new home".into(),
        price: dec!(349.00),
        quantity: 1,
        condition: "Used".into(),
        brand: None,
        category_id: None,
        image_urls: vec!["https://cdn.example.com/one.jpg".into()],
    }
}

#[tokio::test]
async fn seller_creates_and_edits_listing() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;
    let other = common::create_user(&state).await?;
    let title = format!("Teak Stool {}", Uuid::new_v4().simple());

    let created = product_service::create_product(&state, &seller, listing(&title))
        .await?
        .data
        .unwrap();
    assert_eq!(created.seller.as_ref().unwrap().id, seller.user_id);
    assert_eq!(created.images.len(), 1);
    assert_eq!(created.images[0].url, "https://cdn.example.com/one.jpg");

    let err = product_service::update_product(
        &state,
        &other,
        created.id,
        UpdateProductRequest {
            price: Some(dec!(1.00)),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let updated = product_service::update_product(
        &state,
        &seller,
        created.id,
        UpdateProductRequest {
            price: Some(dec!(299.00)),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(updated.price, dec!(299.00));

    let found = product_service::list_products(
        &state,
        ProductQuery {
            category: None,
            search: Some(title.to_lowercase()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(found.items.len(), 1);
    assert_eq!(found.items[0].id, created.id);

    product_service::delete_product(&state, &seller, created.id).await?;
    let err = product_service::get_product(&state, created.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn invalid_listing_is_rejected() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;

    let mut bad = listing("Lamp");
    bad.price = dec!(0);
    let err = product_service::create_product(&state, &seller, bad)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn stored_blob_is_served_and_url_redirects() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let seller = common::create_user(&state).await?;
    let product = common::create_product(&state, &seller, "Vase", dec!(75.00)).await?;

    let blob = ImageActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product),
        position: Set(0),
        url: Set(None),
        image_data: Set(Some(vec![0x89, 0x50, 0x4e, 0x47])),
        mimetype: Set(Some("image/png".into())),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let linked = ImageActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product),
        position: Set(1),
        url: Set(Some("https://cdn.example.com/vase.jpg".into())),
        image_data: Set(None),
        mimetype: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    assert_eq!(
        image_service::find_image(&state, blob.id).await?,
        ImageSource::Blob {
            mimetype: "image/png".into(),
            data: vec![0x89, 0x50, 0x4e, 0x47],
        }
    );
    assert_eq!(
        image_service::find_image(&state, linked.id).await?,
        ImageSource::Redirect("https://cdn.example.com/vase.jpg".into())
    );

    let detail = product_service::get_product(&state, product).await?.data.unwrap();
    let urls: Vec<&str> = detail.images.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            format!("/api/images/{}", blob.id).as_str(),
            "https://cdn.example.com/vase.jpg"
        ]
    );
    Ok(())
}
