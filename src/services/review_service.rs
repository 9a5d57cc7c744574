use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, ActiveValue::NotSet,
};
use validator::Validate;

use crate::{
    dto::reviews::{PatchReviewRequest, ReviewDto, ReviewList, ReviewRequest},
    entity::{
        products::Entity as Products,
        reviews::{ActiveModel, Column, Entity as Reviews, Model as ReviewModel},
    },
    error::{AppError, AppResult},
    response::ApiResponse,
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_reviews(
    state: &AppState,
    product_id: i32,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    ensure_product_exists(state, product_id).await?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Reviews::find()
        .filter(Column::ProductId.eq(product_id))
        .order_by_desc(Column::Date)
        .order_by_desc(Column::Id);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(review_from_entity)
        .collect();

    Ok(ApiResponse::paginated(
        "Reviews",
        ReviewList { items },
        page,
        limit,
        total,
    ))
}

pub async fn get_review(
    state: &AppState,
    product_id: i32,
    id: i32,
) -> AppResult<ApiResponse<ReviewDto>> {
    let review = find_review(state, product_id, id).await?;
    Ok(ApiResponse::success("Review", review_from_entity(review), None))
}

pub async fn create_review(
    state: &AppState,
    product_id: i32,
    payload: ReviewRequest,
) -> AppResult<ApiResponse<ReviewDto>> {
    payload.validate()?;
    ensure_product_exists(state, product_id).await?;

    let review = ActiveModel {
        id: NotSet,
        product_id: Set(product_id),
        name: Set(payload.name),
        description: Set(payload.description),
        date: Set(Utc::now().date_naive()),
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Review created",
        review_from_entity(review),
        None,
    ))
}

pub async fn update_review(
    state: &AppState,
    product_id: i32,
    id: i32,
    payload: ReviewRequest,
) -> AppResult<ApiResponse<ReviewDto>> {
    payload.validate()?;
    let existing = find_review(state, product_id, id).await?;

    let mut active: ActiveModel = existing.into();
    active.name = Set(payload.name);
    active.description = Set(payload.description);
    let review = active.update(&state.orm).await?;

    Ok(ApiResponse::success("Updated", review_from_entity(review), None))
}

pub async fn patch_review(
    state: &AppState,
    product_id: i32,
    id: i32,
    payload: PatchReviewRequest,
) -> AppResult<ApiResponse<ReviewDto>> {
    payload.validate()?;
    let existing = find_review(state, product_id, id).await?;

    let mut active: ActiveModel = existing.clone().into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    let review = if active.is_changed() {
        active.update(&state.orm).await?
    } else {
        existing
    };

    Ok(ApiResponse::success("Updated", review_from_entity(review), None))
}

pub async fn delete_review(state: &AppState, product_id: i32, id: i32) -> AppResult<()> {
    let review = find_review(state, product_id, id).await?;
    Reviews::delete_by_id(review.id).exec(&state.orm).await?;
    Ok(())
}

// A review is only reachable through the product it belongs to.
async fn find_review(state: &AppState, product_id: i32, id: i32) -> AppResult<ReviewModel> {
    Reviews::find()
        .filter(
            Condition::all()
                .add(Column::Id.eq(id))
                .add(Column::ProductId.eq(product_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

async fn ensure_product_exists(state: &AppState, product_id: i32) -> AppResult<()> {
    Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .map(|_| ())
        .ok_or(AppError::NotFound)
}

fn review_from_entity(model: ReviewModel) -> ReviewDto {
    ReviewDto {
        id: model.id,
        name: model.name,
        description: model.description,
        date: model.date,
    }
}
