use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{
            ForgotPasswordRequest, LoginRequest, LoginResponse, RegisterRequest,
            ResetPasswordRequest, TwoFactorRequest, TwoFactorStatus, VerifyOtpRequest,
        },
        cart::{AddToCartRequest, CartItemDto, CartList, CartProduct, ClearCartResponse},
        orders::{
            CheckoutRequest, Coordinates, DeliveryLocation, HistoryItem, HistoryOrder,
            OrderHistory, OrderWithItems, OrderedProduct,
        },
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
    },
    models::{CartItem, Category, DeliveryAddress, ImageRef, Order, OrderItem, Product, Seller, User},
    response::{ApiResponse, Meta},
    routes::{auth, cart, categories, health, images, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        auth::verify_otp,
        auth::forgot_password,
        auth::reset_password,
        auth::two_factor_status,
        categories::list_categories,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        images::serve_image,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        cart::clear_cart,
        orders::checkout,
        orders::order_history,
        orders::get_order
    ),
    components(
        schemas(
            User,
            Category,
            Seller,
            ImageRef,
            Product,
            CartItem,
            DeliveryAddress,
            Order,
            OrderItem,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            VerifyOtpRequest,
            TwoFactorRequest,
            TwoFactorStatus,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            AddToCartRequest,
            CartProduct,
            CartItemDto,
            CartList,
            ClearCartResponse,
            Coordinates,
            DeliveryLocation,
            CheckoutRequest,
            OrderWithItems,
            OrderedProduct,
            HistoryItem,
            HistoryOrder,
            OrderHistory,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            params::ProductQuery,
            health::HealthData,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderHistory>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration and login"),
        (name = "Categories", description = "Product categories"),
        (name = "Products", description = "Product listings"),
        (name = "Images", description = "Product image delivery"),
        (name = "Cart", description = "Shopping cart"),
        (name = "Orders", description = "Checkout and order history"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
