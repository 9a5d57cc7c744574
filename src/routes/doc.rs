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
        auth::{LoginRequest, LoginResponse, RegisterRequest, UserDto},
        cart::{
            AddCartItemRequest, AddedCartItemDto, CartDto, CartItemDto, CartItemList,
            UpdateCartItemRequest,
        },
        collections::{CollectionDto, CollectionList, CollectionRequest, PatchCollectionRequest},
        customers::{
            CreateCustomerRequest, CustomerDto, CustomerList, PatchCustomerRequest,
            UpdateCustomerRequest,
        },
        orders::{CreateOrderRequest, OrderDto, OrderItemDto, OrderList, UpdateOrderRequest},
        products::{
            CreateProductRequest, ProductDto, ProductList, SimpleProductDto, UpdateProductRequest,
        },
        reviews::{PatchReviewRequest, ReviewDto, ReviewList, ReviewRequest},
    },
    entity::{customers::Membership, orders::PaymentStatus},
    response::{ApiResponse, Meta},
    routes::{
        auth, carts, collections, customers, health, orders, params, products, reviews,
    },
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
        health::readiness,
        auth::register,
        auth::login,
        auth::me,
        collections::list_collections,
        collections::get_collection,
        collections::create_collection,
        collections::update_collection,
        collections::patch_collection,
        collections::delete_collection,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        reviews::list_reviews,
        reviews::get_review,
        reviews::create_review,
        reviews::update_review,
        reviews::patch_review,
        reviews::delete_review,
        carts::create_cart,
        carts::get_cart,
        carts::delete_cart,
        carts::list_items,
        carts::get_item,
        carts::add_item,
        carts::update_item,
        carts::delete_item,
        customers::list_customers,
        customers::get_customer,
        customers::create_customer,
        customers::update_customer,
        customers::patch_customer,
        customers::delete_customer,
        customers::get_me,
        customers::update_me,
        orders::list_orders,
        orders::get_order,
        orders::create_order,
        orders::update_order,
        orders::delete_order,
        orders::cancel_order
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            UserDto,
            CollectionDto,
            CollectionList,
            CollectionRequest,
            PatchCollectionRequest,
            ProductDto,
            SimpleProductDto,
            ProductList,
            CreateProductRequest,
            UpdateProductRequest,
            ReviewDto,
            ReviewList,
            ReviewRequest,
            PatchReviewRequest,
            CartDto,
            CartItemDto,
            CartItemList,
            AddCartItemRequest,
            AddedCartItemDto,
            UpdateCartItemRequest,
            CustomerDto,
            CustomerList,
            CreateCustomerRequest,
            UpdateCustomerRequest,
            PatchCustomerRequest,
            Membership,
            OrderDto,
            OrderItemDto,
            OrderList,
            CreateOrderRequest,
            UpdateOrderRequest,
            PaymentStatus,
            params::Pagination,
            params::ProductQuery,
            params::CollectionQuery,
            params::OrderListQuery,
            params::SortOrder,
            params::ProductSortBy,
            health::HealthData,
            Meta,
            ApiResponse<ProductDto>,
            ApiResponse<ProductList>,
            ApiResponse<CartDto>,
            ApiResponse<OrderDto>,
            ApiResponse<OrderList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Registration, login and current user"),
        (name = "Collections", description = "Product collections"),
        (name = "Products", description = "Product catalog"),
        (name = "Reviews", description = "Reviews nested under a product"),
        (name = "Carts", description = "Anonymous carts and their items"),
        (name = "Customers", description = "Customer profiles"),
        (name = "Orders", description = "Order placement and management"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
