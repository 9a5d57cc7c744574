use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::cart::{
        AddCartItemRequest, AddedCartItemDto, CartDto, CartItemDto, CartItemList,
        UpdateCartItemRequest,
    },
    error::AppResult,
    middleware::json::AppJson,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

// Carts are anonymous: holding the UUID is enough to read and fill one.
// No list endpoint; items accept GET/POST/PATCH/DELETE only.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_cart))
        .route("/{cart_id}", get(get_cart).delete(delete_cart))
        .route("/{cart_id}/items", get(list_items).post(add_item))
        .route(
            "/{cart_id}/items/{id}",
            get(get_item).patch(update_item).delete(delete_item),
        )
}

#[utoipa::path(
    post,
    path = "/api/carts",
    responses(
        (status = 201, description = "Create an empty cart", body = ApiResponse<CartDto>)
    ),
    tag = "Carts"
)]
pub async fn create_cart(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<ApiResponse<CartDto>>)> {
    let resp = cart_service::create_cart(&state).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/carts/{cart_id}",
    params(("cart_id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 200, description = "Cart with items and totals", body = ApiResponse<CartDto>),
        (status = 404, description = "Cart not found"),
    ),
    tag = "Carts"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Path(cart_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CartDto>>> {
    let resp = cart_service::get_cart(&state, cart_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/carts/{cart_id}",
    params(("cart_id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 204, description = "Deleted cart"),
        (status = 404, description = "Cart not found"),
    ),
    tag = "Carts"
)]
pub async fn delete_cart(
    State(state): State<AppState>,
    Path(cart_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    cart_service::delete_cart(&state, cart_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/carts/{cart_id}/items",
    params(("cart_id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 200, description = "Items in the cart", body = ApiResponse<CartItemList>),
        (status = 404, description = "Cart not found"),
    ),
    tag = "Carts"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Path(cart_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CartItemList>>> {
    let resp = cart_service::list_items(&state, cart_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/carts/{cart_id}/items/{id}",
    params(
        ("cart_id" = Uuid, Path, description = "Cart ID"),
        ("id" = i32, Path, description = "Cart item ID")
    ),
    responses(
        (status = 200, description = "Cart item", body = ApiResponse<CartItemDto>),
        (status = 404, description = "Cart item not found"),
    ),
    tag = "Carts"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path((cart_id, id)): Path<(Uuid, i32)>,
) -> AppResult<Json<ApiResponse<CartItemDto>>> {
    let resp = cart_service::get_item(&state, cart_id, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/carts/{cart_id}/items",
    params(("cart_id" = Uuid, Path, description = "Cart ID")),
    request_body = AddCartItemRequest,
    responses(
        (status = 201, description = "Item added, or quantity merged into the existing line", body = ApiResponse<AddedCartItemDto>),
        (status = 400, description = "Product does not exist or invalid quantity"),
        (status = 404, description = "Cart not found"),
    ),
    tag = "Carts"
)]
pub async fn add_item(
    State(state): State<AppState>,
    Path(cart_id): Path<Uuid>,
    AppJson(payload): AppJson<AddCartItemRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AddedCartItemDto>>)> {
    let resp = cart_service::add_cart_item(&state, cart_id, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    patch,
    path = "/api/carts/{cart_id}/items/{id}",
    params(
        ("cart_id" = Uuid, Path, description = "Cart ID"),
        ("id" = i32, Path, description = "Cart item ID")
    ),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Quantity updated", body = ApiResponse<CartItemDto>),
        (status = 404, description = "Cart item not found"),
    ),
    tag = "Carts"
)]
pub async fn update_item(
    State(state): State<AppState>,
    Path((cart_id, id)): Path<(Uuid, i32)>,
    AppJson(payload): AppJson<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartItemDto>>> {
    let resp = cart_service::update_item(&state, cart_id, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/carts/{cart_id}/items/{id}",
    params(
        ("cart_id" = Uuid, Path, description = "Cart ID"),
        ("id" = i32, Path, description = "Cart item ID")
    ),
    responses(
        (status = 204, description = "Removed from cart"),
        (status = 404, description = "Cart item not found"),
    ),
    tag = "Carts"
)]
pub async fn delete_item(
    State(state): State<AppState>,
    Path((cart_id, id)): Path<(Uuid, i32)>,
) -> AppResult<StatusCode> {
    cart_service::delete_item(&state, cart_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
