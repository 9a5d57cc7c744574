use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr,
    ActiveValue::NotSet,
};
use sea_orm::sea_query::{Expr, OnConflict};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::cart::{
        AddCartItemRequest, AddedCartItemDto, CartDto, CartItemDto, CartItemList,
        UpdateCartItemRequest,
    },
    entity::{
        cart_items::{ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems, Model as CartItemModel},
        carts::{ActiveModel as CartActive, Entity as Carts},
        products::{Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    response::ApiResponse,
    services::product_service::simple_product,
    state::AppState,
};

pub async fn create_cart(state: &AppState) -> AppResult<ApiResponse<CartDto>> {
    let cart = CartActive {
        id: Set(Uuid::new_v4()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    tracing::debug!(cart_id = %cart.id, "cart created");
    Ok(ApiResponse::success(
        "Cart created",
        CartDto {
            id: cart.id,
            items: Vec::new(),
            total_price: Decimal::ZERO,
        },
        None,
    ))
}

pub async fn get_cart(state: &AppState, cart_id: Uuid) -> AppResult<ApiResponse<CartDto>> {
    ensure_cart_exists(state, cart_id).await?;
    let items = load_items(state, cart_id).await?;
    let total_price = items.iter().map(|item| item.total_price).sum();

    Ok(ApiResponse::success(
        "Cart",
        CartDto {
            id: cart_id,
            items,
            total_price,
        },
        None,
    ))
}

pub async fn delete_cart(state: &AppState, cart_id: Uuid) -> AppResult<()> {
    let result = Carts::delete_by_id(cart_id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn list_items(state: &AppState, cart_id: Uuid) -> AppResult<ApiResponse<CartItemList>> {
    ensure_cart_exists(state, cart_id).await?;
    let items = load_items(state, cart_id).await?;
    Ok(ApiResponse::success("Cart items", CartItemList { items }, None))
}

pub async fn get_item(
    state: &AppState,
    cart_id: Uuid,
    item_id: i32,
) -> AppResult<ApiResponse<CartItemDto>> {
    let (item, product) = CartItems::find()
        .filter(item_condition(cart_id, item_id))
        .find_also_related(Products)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let product = product.ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success("Cart item", cart_item_dto(item, &product), None))
}

/// Adds `quantity` of a product to the cart, merging into an existing row for the
/// same product instead of creating a duplicate. The merge is a single
/// `INSERT .. ON CONFLICT (cart_id, product_id) DO UPDATE`, so concurrent adds
/// of the same product both land on one line.
pub async fn add_cart_item(
    state: &AppState,
    cart_id: Uuid,
    payload: AddCartItemRequest,
) -> AppResult<ApiResponse<AddedCartItemDto>> {
    payload.validate()?;
    ensure_cart_exists(state, cart_id).await?;

    let product_exists = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .is_some();
    if !product_exists {
        return Err(AppError::BadRequest("Product does not exist".to_string()));
    }

    let item = CartItems::insert(CartItemActive {
        id: NotSet,
        cart_id: Set(cart_id),
        product_id: Set(payload.product_id),
        quantity: Set(payload.quantity),
    })
    .on_conflict(
        OnConflict::columns([CartItemCol::CartId, CartItemCol::ProductId])
            .value(
                CartItemCol::Quantity,
                Expr::col((CartItems, CartItemCol::Quantity)).add(payload.quantity),
            )
            .to_owned(),
    )
    .exec_with_returning(&state.orm)
    .await
    .map_err(|err| match err.sql_err() {
        // The cart or product went away between the checks and the insert.
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => AppError::NotFound,
        _ => AppError::OrmError(err),
    })?;

    tracing::debug!(
        cart_id = %cart_id,
        product_id = item.product_id,
        quantity = item.quantity,
        "cart item saved"
    );
    Ok(ApiResponse::success(
        "OK",
        AddedCartItemDto {
            id: item.id,
            product_id: item.product_id,
            quantity: item.quantity,
        },
        None,
    ))
}

pub async fn update_item(
    state: &AppState,
    cart_id: Uuid,
    item_id: i32,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartItemDto>> {
    payload.validate()?;
    let item = find_item(state, cart_id, item_id).await?;
    let product = Products::find_by_id(item.product_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: CartItemActive = item.into();
    active.quantity = Set(payload.quantity);
    let item = active.update(&state.orm).await?;

    Ok(ApiResponse::success("Updated", cart_item_dto(item, &product), None))
}

pub async fn delete_item(state: &AppState, cart_id: Uuid, item_id: i32) -> AppResult<()> {
    let result = CartItems::delete_many()
        .filter(item_condition(cart_id, item_id))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

async fn ensure_cart_exists(state: &AppState, cart_id: Uuid) -> AppResult<()> {
    Carts::find_by_id(cart_id)
        .one(&state.orm)
        .await?
        .map(|_| ())
        .ok_or(AppError::NotFound)
}

async fn find_item(state: &AppState, cart_id: Uuid, item_id: i32) -> AppResult<CartItemModel> {
    CartItems::find()
        .filter(item_condition(cart_id, item_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

async fn load_items(state: &AppState, cart_id: Uuid) -> AppResult<Vec<CartItemDto>> {
    let rows = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart_id))
        .order_by_asc(CartItemCol::Id)
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(item, product)| product.map(|p| cart_item_dto(item, &p)))
        .collect())
}

fn item_condition(cart_id: Uuid, item_id: i32) -> Condition {
    Condition::all()
        .add(CartItemCol::Id.eq(item_id))
        .add(CartItemCol::CartId.eq(cart_id))
}

fn cart_item_dto(item: CartItemModel, product: &ProductModel) -> CartItemDto {
    CartItemDto {
        id: item.id,
        quantity: item.quantity,
        total_price: line_total(product.unit_price, item.quantity),
        product: simple_product(product),
    }
}
