use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait, ActiveValue::NotSet,
};
use sea_orm::sea_query::LockType;

use crate::{
    dto::orders::{CreateOrderRequest, OrderDto, OrderItemDto, OrderList, UpdateOrderRequest},
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        carts::Entity as Carts,
        customers::{Column as CustomerCol, Entity as Customers},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
            PaymentStatus,
        },
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_can_cancel_order},
    response::ApiResponse,
    routes::params::{OrderListQuery, SortOrder},
    services::{
        customer_service::{customer_from_entity, get_or_create_customer},
        product_service::simple_product,
    },
    state::AppState,
};

/// Lists orders visible to the caller: staff see every order, everyone else
/// only the orders of their own customer profile.
pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = visibility(state, user).await?;
    if let Some(status) = query.payment_status {
        condition = condition.add(OrderCol::PaymentStatus.eq(status));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::PlacedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::PlacedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .order_by_asc(OrderCol::Id)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = load_order_dtos(&state.orm, orders).await?;

    Ok(ApiResponse::paginated(
        "Ok",
        OrderList { items },
        page,
        limit,
        total,
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: i32,
) -> AppResult<ApiResponse<OrderDto>> {
    let order = find_visible_order(state, user, id).await?;
    let order = single_order_dto(&state.orm, order).await?;
    Ok(ApiResponse::success("OK", order, None))
}

/// Turns a cart into an order in a single transaction: resolve the customer,
/// create the order, snapshot every cart line with the product's current price,
/// then drop the cart. Any failure leaves the cart and the order tables untouched.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderDto>> {
    let cart_id = payload.cart_id;
    let txn = state.orm.begin().await?;

    let cart = Carts::find_by_id(cart_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    if cart.is_none() {
        return Err(AppError::BadRequest(
            "Cart with given id does not exist".into(),
        ));
    }

    let rows = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart_id))
        .order_by_asc(CartItemCol::Id)
        .find_also_related(Products)
        .all(&txn)
        .await?;
    if rows.is_empty() {
        return Err(AppError::BadRequest("Cart with given id is empty".into()));
    }

    let customer = get_or_create_customer(&txn, user.user_id).await?;

    let order = OrderActive {
        id: NotSet,
        placed_at: Set(Utc::now().into()),
        payment_status: Set(PaymentStatus::Pending),
        customer_id: Set(customer.id),
    }
    .insert(&txn)
    .await?;

    let mut order_items = Vec::with_capacity(rows.len());
    for (item, product) in rows {
        let product = product.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "cart item {} references a missing product",
                item.id
            ))
        })?;
        order_items.push(OrderItemActive {
            id: NotSet,
            order_id: Set(order.id),
            product_id: Set(product.id),
            quantity: Set(item.quantity),
            unit_price: Set(product.unit_price),
        });
    }
    let line_count = order_items.len();
    OrderItems::insert_many(order_items).exec(&txn).await?;

    Carts::delete_by_id(cart_id).exec(&txn).await?;

    let order_dto = single_order_dto(&txn, order).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = order_dto.id,
        customer_id = customer.id,
        %cart_id,
        lines = line_count,
        "order placed"
    );
    Ok(ApiResponse::success("Order created", order_dto, None))
}

pub async fn update_order(
    state: &AppState,
    user: &AuthUser,
    id: i32,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<OrderDto>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: OrderActive = order.into();
    active.payment_status = Set(payload.payment_status);
    let order = active.update(&state.orm).await?;

    tracing::info!(order_id = order.id, payment_status = ?order.payment_status, "order updated");
    let order = single_order_dto(&state.orm, order).await?;
    Ok(ApiResponse::success("Updated", order, None))
}

/// Orders that still own items are kept; the items reference them with RESTRICT.
pub async fn delete_order(state: &AppState, user: &AuthUser, id: i32) -> AppResult<()> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .count(&state.orm)
        .await?;
    if items > 0 {
        tracing::warn!(order_id = id, "refusing to delete order with items");
        return Err(AppError::MethodNotAllowed(
            "Order cannot be deleted because it has order items".into(),
        ));
    }

    Orders::delete_by_id(order.id).exec(&state.orm).await?;
    Ok(())
}

/// Marks a pending order as failed. Needs staff or the cancel-order permission,
/// and the order must be visible to the caller.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: i32,
) -> AppResult<ApiResponse<OrderDto>> {
    ensure_can_cancel_order(user)?;
    let order = find_visible_order(state, user, id).await?;

    if order.payment_status != PaymentStatus::Pending {
        return Err(AppError::BadRequest(
            "Only pending orders can be cancelled".into(),
        ));
    }

    let mut active: OrderActive = order.into();
    active.payment_status = Set(PaymentStatus::Failed);
    let order = active.update(&state.orm).await?;

    tracing::info!(order_id = order.id, user_id = user.user_id, "order cancelled");
    let order = single_order_dto(&state.orm, order).await?;
    Ok(ApiResponse::success("Order cancelled", order, None))
}

async fn visibility(state: &AppState, user: &AuthUser) -> AppResult<Condition> {
    if user.is_staff {
        return Ok(Condition::all());
    }
    let customer = get_or_create_customer(&state.orm, user.user_id).await?;
    Ok(Condition::all().add(OrderCol::CustomerId.eq(customer.id)))
}

async fn find_visible_order(state: &AppState, user: &AuthUser, id: i32) -> AppResult<OrderModel> {
    let condition = visibility(state, user).await?.add(OrderCol::Id.eq(id));
    Orders::find()
        .filter(condition)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

async fn single_order_dto<C>(conn: &C, order: OrderModel) -> AppResult<OrderDto>
where
    C: ConnectionTrait,
{
    load_order_dtos(conn, vec![order])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order vanished while loading")))
}

/// Attaches customers and items (with their products) to a page of orders,
/// preserving the input order.
async fn load_order_dtos<C>(conn: &C, orders: Vec<OrderModel>) -> AppResult<Vec<OrderDto>>
where
    C: ConnectionTrait,
{
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let order_ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
    let customer_ids: Vec<i32> = orders.iter().map(|o| o.customer_id).collect();

    let customers: HashMap<i32, _> = Customers::find()
        .filter(CustomerCol::Id.is_in(customer_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let mut items: HashMap<i32, Vec<OrderItemDto>> = HashMap::new();
    let rows = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(order_ids))
        .order_by_asc(OrderItemCol::Id)
        .find_also_related(Products)
        .all(conn)
        .await?;
    for (item, product) in rows {
        let Some(product) = product else {
            continue;
        };
        items.entry(item.order_id).or_default().push(OrderItemDto {
            id: item.id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            product: simple_product(&product),
        });
    }

    orders
        .into_iter()
        .map(|order| {
            let customer = customers.get(&order.customer_id).cloned().ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "order {} references a missing customer",
                    order.id
                ))
            })?;
            Ok(OrderDto {
                id: order.id,
                customer: customer_from_entity(customer),
                placed_at: order.placed_at.with_timezone(&Utc),
                payment_status: order.payment_status,
                items: items.remove(&order.id).unwrap_or_default(),
            })
        })
        .collect()
}
