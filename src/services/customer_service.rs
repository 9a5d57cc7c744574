use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, ActiveValue::NotSet,
};
use sea_orm::sea_query::OnConflict;
use validator::Validate;

use crate::{
    dto::customers::{
        CreateCustomerRequest, CustomerDto, CustomerList, PatchCustomerRequest,
        UpdateCustomerRequest,
    },
    entity::{
        customers::{ActiveModel, Column, Entity as Customers, Membership, Model as CustomerModel},
        orders::{Column as OrderCol, Entity as Orders},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    response::ApiResponse,
    routes::params::Pagination,
    state::AppState,
};

/// Returns the customer profile bound to `user_id`, creating a blank one on first access.
/// Concurrent first accesses race on the unique `user_id`; the loser re-reads the winner's row.
pub async fn get_or_create_customer<C>(conn: &C, user_id: i32) -> AppResult<CustomerModel>
where
    C: ConnectionTrait,
{
    if let Some(customer) = find_by_user(conn, user_id).await? {
        return Ok(customer);
    }

    let inserted = Customers::insert(ActiveModel {
        id: NotSet,
        user_id: Set(user_id),
        membership: Set(Membership::default()),
        phone: Set(String::new()),
        birth_date: Set(None),
    })
    .on_conflict(OnConflict::column(Column::UserId).do_nothing().to_owned())
    .exec_without_returning(conn)
    .await?;

    let customer = find_by_user(conn, user_id).await?.ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("customer for user {user_id} missing after insert"))
    })?;
    if inserted > 0 {
        tracing::info!(user_id, customer_id = customer.id, "customer profile created");
    }
    Ok(customer)
}

async fn find_by_user<C>(conn: &C, user_id: i32) -> AppResult<Option<CustomerModel>>
where
    C: ConnectionTrait,
{
    Ok(Customers::find()
        .filter(Column::UserId.eq(user_id))
        .one(conn)
        .await?)
}

pub async fn list_customers(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CustomerList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Customers::find().order_by_asc(Column::Id);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(customer_from_entity)
        .collect();

    Ok(ApiResponse::paginated(
        "Customers",
        CustomerList { items },
        page,
        limit,
        total,
    ))
}

pub async fn get_customer(
    state: &AppState,
    user: &AuthUser,
    id: i32,
) -> AppResult<ApiResponse<CustomerDto>> {
    ensure_admin(user)?;
    let customer = find_customer(state, id).await?;
    Ok(ApiResponse::success("Customer", customer_from_entity(customer), None))
}

pub async fn create_customer(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCustomerRequest,
) -> AppResult<ApiResponse<CustomerDto>> {
    ensure_admin(user)?;
    payload.validate()?;

    if Users::find_by_id(payload.user_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::BadRequest("User does not exist".into()));
    }
    let taken = Customers::find()
        .filter(Column::UserId.eq(payload.user_id))
        .count(&state.orm)
        .await?;
    if taken > 0 {
        return Err(AppError::BadRequest(
            "User already has a customer profile".into(),
        ));
    }

    let customer = ActiveModel {
        id: NotSet,
        user_id: Set(payload.user_id),
        membership: Set(payload.membership),
        phone: Set(payload.phone),
        birth_date: Set(payload.birth_date),
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Customer created",
        customer_from_entity(customer),
        None,
    ))
}

pub async fn update_customer(
    state: &AppState,
    user: &AuthUser,
    id: i32,
    payload: UpdateCustomerRequest,
) -> AppResult<ApiResponse<CustomerDto>> {
    ensure_admin(user)?;
    let customer = find_customer(state, id).await?;
    let customer = apply_update(state, customer, payload).await?;
    Ok(ApiResponse::success("Updated", customer_from_entity(customer), None))
}

pub async fn patch_customer(
    state: &AppState,
    user: &AuthUser,
    id: i32,
    payload: PatchCustomerRequest,
) -> AppResult<ApiResponse<CustomerDto>> {
    ensure_admin(user)?;
    payload.validate()?;
    let customer = find_customer(state, id).await?;

    let mut active: ActiveModel = customer.clone().into();
    if let Some(membership) = payload.membership {
        active.membership = Set(membership);
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(phone);
    }
    if let Some(birth_date) = payload.birth_date {
        active.birth_date = Set(birth_date);
    }
    let customer = if active.is_changed() {
        active.update(&state.orm).await?
    } else {
        customer
    };

    Ok(ApiResponse::success("Updated", customer_from_entity(customer), None))
}

/// Customers with orders stay, the order history references them.
pub async fn delete_customer(state: &AppState, user: &AuthUser, id: i32) -> AppResult<()> {
    ensure_admin(user)?;
    let customer = find_customer(state, id).await?;

    let orders = Orders::find()
        .filter(OrderCol::CustomerId.eq(customer.id))
        .count(&state.orm)
        .await?;
    if orders > 0 {
        return Err(AppError::MethodNotAllowed(
            "Customer cannot be deleted because it has orders".into(),
        ));
    }

    Customers::delete_by_id(customer.id).exec(&state.orm).await?;
    Ok(())
}

pub async fn get_me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CustomerDto>> {
    let customer = get_or_create_customer(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success("OK", customer_from_entity(customer), None))
}

pub async fn update_me(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateCustomerRequest,
) -> AppResult<ApiResponse<CustomerDto>> {
    let customer = get_or_create_customer(&state.orm, user.user_id).await?;
    let customer = apply_update(state, customer, payload).await?;
    Ok(ApiResponse::success("OK", customer_from_entity(customer), None))
}

async fn apply_update(
    state: &AppState,
    customer: CustomerModel,
    payload: UpdateCustomerRequest,
) -> AppResult<CustomerModel> {
    payload.validate()?;
    let mut active: ActiveModel = customer.into();
    active.membership = Set(payload.membership);
    active.phone = Set(payload.phone);
    active.birth_date = Set(payload.birth_date);
    Ok(active.update(&state.orm).await?)
}

async fn find_customer(state: &AppState, id: i32) -> AppResult<CustomerModel> {
    Customers::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

pub(crate) fn customer_from_entity(model: CustomerModel) -> CustomerDto {
    CustomerDto {
        id: model.id,
        user_id: model.user_id,
        membership: model.membership,
        phone: model.phone,
        birth_date: model.birth_date,
    }
}
