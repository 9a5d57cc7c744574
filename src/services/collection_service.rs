use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, ActiveValue::NotSet,
};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use validator::Validate;

use crate::{
    dto::collections::{CollectionDto, CollectionList, CollectionRequest, PatchCollectionRequest},
    entity::{
        collections::{ActiveModel, Column, Entity as Collections, Model as CollectionModel},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    response::ApiResponse,
    routes::params::CollectionQuery,
    services::product_service::contains_pattern,
    state::AppState,
};

pub async fn list_collections(
    state: &AppState,
    query: CollectionQuery,
) -> AppResult<ApiResponse<CollectionList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(title) = query.title.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Expr::col(Column::Title).ilike(contains_pattern(title)));
    }
    if let Some(id_gt) = query.id_gt {
        condition = condition.add(Column::Id.gt(id_gt));
    }
    if let Some(id_lt) = query.id_lt {
        condition = condition.add(Column::Id.lt(id_lt));
    }

    let finder = Collections::find()
        .filter(condition)
        .order_by_asc(Column::Id);
    let total = finder.clone().count(&state.orm).await? as i64;

    let collections = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let counts = product_counts(state, collections.iter().map(|c| c.id).collect()).await?;
    let items = collections
        .into_iter()
        .map(|c| {
            let count = counts.get(&c.id).copied().unwrap_or(0);
            collection_from_entity(c, count)
        })
        .collect();

    Ok(ApiResponse::paginated(
        "Collections",
        CollectionList { items },
        page,
        limit,
        total,
    ))
}

pub async fn get_collection(state: &AppState, id: i32) -> AppResult<ApiResponse<CollectionDto>> {
    let collection = Collections::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let count = count_products(state, id).await?;
    Ok(ApiResponse::success(
        "Collection",
        collection_from_entity(collection, count),
        None,
    ))
}

pub async fn create_collection(
    state: &AppState,
    user: &AuthUser,
    payload: CollectionRequest,
) -> AppResult<ApiResponse<CollectionDto>> {
    ensure_admin(user)?;
    payload.validate()?;

    let collection = ActiveModel {
        id: NotSet,
        title: Set(payload.title),
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(collection_id = collection.id, "collection created");
    Ok(ApiResponse::success(
        "Collection created",
        collection_from_entity(collection, 0),
        None,
    ))
}

pub async fn update_collection(
    state: &AppState,
    user: &AuthUser,
    id: i32,
    payload: CollectionRequest,
) -> AppResult<ApiResponse<CollectionDto>> {
    ensure_admin(user)?;
    payload.validate()?;

    let existing = Collections::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    active.title = Set(payload.title);
    let collection = active.update(&state.orm).await?;
    let count = count_products(state, id).await?;

    Ok(ApiResponse::success(
        "Updated",
        collection_from_entity(collection, count),
        None,
    ))
}

pub async fn patch_collection(
    state: &AppState,
    user: &AuthUser,
    id: i32,
    payload: PatchCollectionRequest,
) -> AppResult<ApiResponse<CollectionDto>> {
    ensure_admin(user)?;
    payload.validate()?;

    let existing = Collections::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let collection = match payload.title {
        Some(title) => {
            let mut active: ActiveModel = existing.into();
            active.title = Set(title);
            active.update(&state.orm).await?
        }
        None => existing,
    };
    let count = count_products(state, id).await?;

    Ok(ApiResponse::success(
        "Updated",
        collection_from_entity(collection, count),
        None,
    ))
}

/// Deleting a collection that still owns products is refused with 405.
pub async fn delete_collection(state: &AppState, user: &AuthUser, id: i32) -> AppResult<()> {
    ensure_admin(user)?;

    let collection = Collections::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if count_products(state, collection.id).await? > 0 {
        tracing::warn!(collection_id = id, "refusing to delete collection with products");
        return Err(AppError::MethodNotAllowed(
            "Collection can't be deleted because it has products".into(),
        ));
    }

    Collections::delete_by_id(collection.id)
        .exec(&state.orm)
        .await?;
    tracing::info!(collection_id = id, "collection deleted");
    Ok(())
}

async fn count_products(state: &AppState, collection_id: i32) -> AppResult<i64> {
    let count = Products::find()
        .filter(ProdCol::CollectionId.eq(collection_id))
        .count(&state.orm)
        .await?;
    Ok(count as i64)
}

async fn product_counts(state: &AppState, ids: Vec<i32>) -> AppResult<HashMap<i32, i64>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(i32, i64)> = Products::find()
        .select_only()
        .column(ProdCol::CollectionId)
        .column_as(ProdCol::Id.count(), "products_count")
        .filter(ProdCol::CollectionId.is_in(ids))
        .group_by(ProdCol::CollectionId)
        .into_tuple()
        .all(&state.orm)
        .await?;

    Ok(rows.into_iter().collect())
}

fn collection_from_entity(model: CollectionModel, products_count: i64) -> CollectionDto {
    CollectionDto {
        id: model.id,
        title: model.title,
        products_count,
    }
}
