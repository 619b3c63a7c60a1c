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
        auth::{AuthToken, LoginRequest, RegisterRequest},
        cart::{AddToCartRequest, CartLine, CartView},
        catalog::{
            CategoryList, CreateCategoryRequest, CreateProductRequest, ProductList,
            UpdateCategoryRequest, UpdateProductRequest,
        },
        orders::{
            OrderHistory, OrderList, OrderWithItems, PlacedOrder, UpdateInvoiceStatusRequest,
            UpdateOrderStatusRequest,
        },
    },
    entity::sea_orm_active_enums::{InvoiceStatus, OrderStatus, Role},
    models::{CartItem, Category, Invoice, Order, OrderItem, Product, User},
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, catalog, health, orders, params},
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
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        orders::place_order,
        orders::order_history,
        orders::get_order,
        catalog::list_categories,
        catalog::create_category,
        catalog::get_category,
        catalog::update_category,
        catalog::delete_category,
        catalog::list_products,
        catalog::create_product,
        catalog::get_product,
        catalog::update_product,
        catalog::delete_product,
        admin::list_all_orders,
        admin::update_order_status,
        admin::update_invoice_status
    ),
    components(
        schemas(
            User,
            Role,
            Category,
            Product,
            CartItem,
            Order,
            OrderItem,
            Invoice,
            OrderStatus,
            InvoiceStatus,
            RegisterRequest,
            LoginRequest,
            AuthToken,
            AddToCartRequest,
            CartView,
            CartLine,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CreateProductRequest,
            UpdateProductRequest,
            CategoryList,
            ProductList,
            PlacedOrder,
            OrderWithItems,
            OrderHistory,
            OrderList,
            UpdateOrderStatusRequest,
            UpdateInvoiceStatusRequest,
            params::SortOrder,
            params::ProductSortBy,
            Meta,
            ApiResponse<User>,
            ApiResponse<AuthToken>,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<PlacedOrder>,
            ApiResponse<OrderHistory>,
            ApiResponse<OrderList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and profile"),
        (name = "Catalog", description = "Categories and products"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order placement and history"),
        (name = "Admin", description = "Order administration"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
