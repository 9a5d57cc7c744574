use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Set, ActiveValue::NotSet,
};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use validator::Validate;

use crate::{
    dto::products::{
        CreateProductRequest, ProductDto, ProductList, SimpleProductDto, UpdateProductRequest,
    },
    entity::{
        collections::{Column as CollectionCol, Entity as Collections},
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel, Relation},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    response::ApiResponse,
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

/// Multiplier applied to `unit_price` for the displayed tax-inclusive price.
pub const TAX_MULTIPLIER: Decimal = Decimal::from_parts(16, 0, 0, false, 1);

pub fn price_with_tax(unit_price: Decimal) -> Decimal {
    (unit_price * TAX_MULTIPLIER).round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Lowercase ASCII slug: alphanumerics kept, every other run collapsed to one `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
/// `%term%` pattern for `ILIKE` with `\`, `%` and `_` in `term` matched literally.
/// `%term%` pattern for `ILIKE` with `\\`, `%` and `_` in `term` matched literally.
pub fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = contains_pattern(search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col((Products, Column::Title)).ilike(pattern.clone()))
                .add(Expr::col((Products, Column::Description)).ilike(pattern)),
        );
    }

    if let Some(collection_id) = query.collection_id {
        condition = condition.add(Column::CollectionId.eq(collection_id));
    }

    if let Some(min_price) = query.unit_price_gt {
        condition = condition.add(Column::UnitPrice.gt(min_price));
    }

    if let Some(max_price) = query.unit_price_lt {
        condition = condition.add(Column::UnitPrice.lt(max_price));
    }

    let mut finder = Products::find().filter(condition);
    let total = finder.clone().count(&state.orm).await? as i64;

    let sort_order = query.sort_order.unwrap_or(SortOrder::Asc);
    finder = match (query.sort_by, sort_order) {
        (None, _) => finder,
        (Some(ProductSortBy::UnitPrice), SortOrder::Asc) => finder.order_by_asc(Column::UnitPrice),
        (Some(ProductSortBy::UnitPrice), SortOrder::Desc) => {
            finder.order_by_desc(Column::UnitPrice)
        }
        (Some(ProductSortBy::LastUpdate), SortOrder::Asc) => {
            finder.order_by_asc(Column::LastUpdate)
        }
        (Some(ProductSortBy::LastUpdate), SortOrder::Desc) => {
            finder.order_by_desc(Column::LastUpdate)
        }
        (Some(ProductSortBy::CollectionTitle), order) => {
            let finder = finder.join(JoinType::InnerJoin, Relation::Collections.def());
            match order {
                SortOrder::Asc => finder.order_by_asc(CollectionCol::Title),
                SortOrder::Desc => finder.order_by_desc(CollectionCol::Title),
            }
        }
    };

    let items = finder
        .order_by_asc(Column::Id)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::paginated(
        "Products",
        ProductList { items },
        page,
        limit,
        total,
    ))
}

pub async fn get_product(state: &AppState, id: i32) -> AppResult<ApiResponse<ProductDto>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Product", product_from_entity(product), None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<ProductDto>> {
    ensure_admin(user)?;
    payload.validate()?;
    ensure_collection_exists(state, payload.collection).await?;

    let slug = payload.slug.unwrap_or_else(|| slugify(&payload.title));
    let product = ActiveModel {
        id: NotSet,
        title: Set(payload.title),
        slug: Set(slug),
        description: Set(payload.description),
        unit_price: Set(payload.unit_price),
        inventory: Set(payload.inventory),
        last_update: Set(Utc::now().into()),
        collection_id: Set(payload.collection),
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(product_id = product.id, "product created");
    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        None,
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: i32,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<ProductDto>> {
    ensure_admin(user)?;
    payload.validate()?;

    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    if let Some(title) = payload.title {
        active.title = Set(title);
    }
    if let Some(slug) = payload.slug {
        active.slug = Set(slug);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(unit_price) = payload.unit_price {
        active.unit_price = Set(unit_price);
    }
    if let Some(inventory) = payload.inventory {
        active.inventory = Set(inventory);
    }
    if let Some(collection) = payload.collection {
        ensure_collection_exists(state, collection).await?;
        active.collection_id = Set(collection);
    }
    active.last_update = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product),
        None,
    ))
}

/// Products referenced by any order item are kept for the order history.
pub async fn delete_product(state: &AppState, user: &AuthUser, id: i32) -> AppResult<()> {
    ensure_admin(user)?;

    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let referenced = OrderItems::find()
        .filter(OrderItemCol::ProductId.eq(product.id))
        .count(&state.orm)
        .await?;
    if referenced > 0 {
        tracing::warn!(product_id = id, "refusing to delete product with order items");
        return Err(AppError::MethodNotAllowed(
            "Product cannot be deleted because it is associated with an order item".into(),
        ));
    }

    Products::delete_by_id(product.id).exec(&state.orm).await?;
    tracing::info!(product_id = id, "product deleted");
    Ok(())
}

async fn ensure_collection_exists(state: &AppState, collection_id: i32) -> AppResult<()> {
    let exists = Collections::find_by_id(collection_id)
        .one(&state.orm)
        .await?
        .is_some();
    if !exists {
        return Err(AppError::BadRequest(format!(
            "Collection {} does not exist",
            collection_id
        )));
    }
    Ok(())
}

pub(crate) fn simple_product(model: &ProductModel) -> SimpleProductDto {
    SimpleProductDto {
        id: model.id,
        unit_price: model.unit_price,
        title: model.title.clone(),
    }
}

fn product_from_entity(model: ProductModel) -> ProductDto {
    ProductDto {
        id: model.id,
        price_with_tax: price_with_tax(model.unit_price),
        title: model.title,
        description: model.description,
        slug: model.slug,
        inventory: model.inventory,
        unit_price: model.unit_price,
        collection: model.collection_id,
    }
}
