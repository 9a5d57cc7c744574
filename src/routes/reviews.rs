use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};

use crate::{
    dto::reviews::{PatchReviewRequest, ReviewDto, ReviewList, ReviewRequest},
    error::AppResult,
    middleware::json::AppJson,
    response::ApiResponse,
    routes::params::Pagination,
    services::review_service,
    state::AppState,
};

/// Mounted under `/products/{product_id}/reviews`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reviews).post(create_review))
        .route(
            "/{id}",
            get(get_review)
                .put(update_review)
                .patch(patch_review)
                .delete(delete_review),
        )
}

#[utoipa::path(
    get,
    path = "/api/products/{product_id}/reviews",
    params(
        ("product_id" = i32, Path, description = "Product ID"),
        Pagination
    ),
    responses(
        (status = 200, description = "List reviews of a product", body = ApiResponse<ReviewList>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Reviews"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    let resp = review_service::list_reviews(&state, product_id, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{product_id}/reviews/{id}",
    params(
        ("product_id" = i32, Path, description = "Product ID"),
        ("id" = i32, Path, description = "Review ID")
    ),
    responses(
        (status = 200, description = "Get review", body = ApiResponse<ReviewDto>),
        (status = 404, description = "Review not found"),
    ),
    tag = "Reviews"
)]
pub async fn get_review(
    State(state): State<AppState>,
    Path((product_id, id)): Path<(i32, i32)>,
) -> AppResult<Json<ApiResponse<ReviewDto>>> {
    let resp = review_service::get_review(&state, product_id, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products/{product_id}/reviews",
    params(("product_id" = i32, Path, description = "Product ID")),
    request_body = ReviewRequest,
    responses(
        (status = 201, description = "Create review", body = ApiResponse<ReviewDto>),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Product not found"),
    ),
    tag = "Reviews"
)]
pub async fn create_review(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
    AppJson(payload): AppJson<ReviewRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ReviewDto>>)> {
    let resp = review_service::create_review(&state, product_id, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/products/{product_id}/reviews/{id}",
    params(
        ("product_id" = i32, Path, description = "Product ID"),
        ("id" = i32, Path, description = "Review ID")
    ),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Updated review", body = ApiResponse<ReviewDto>),
        (status = 404, description = "Review not found"),
    ),
    tag = "Reviews"
)]
pub async fn update_review(
    State(state): State<AppState>,
    Path((product_id, id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<ReviewRequest>,
) -> AppResult<Json<ApiResponse<ReviewDto>>> {
    let resp = review_service::update_review(&state, product_id, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/products/{product_id}/reviews/{id}",
    params(
        ("product_id" = i32, Path, description = "Product ID"),
        ("id" = i32, Path, description = "Review ID")
    ),
    request_body = PatchReviewRequest,
    responses(
        (status = 200, description = "Partially updated review", body = ApiResponse<ReviewDto>),
        (status = 404, description = "Review not found"),
    ),
    tag = "Reviews"
)]
pub async fn patch_review(
    State(state): State<AppState>,
    Path((product_id, id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<PatchReviewRequest>,
) -> AppResult<Json<ApiResponse<ReviewDto>>> {
    let resp = review_service::patch_review(&state, product_id, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/products/{product_id}/reviews/{id}",
    params(
        ("product_id" = i32, Path, description = "Product ID"),
        ("id" = i32, Path, description = "Review ID")
    ),
    responses(
        (status = 204, description = "Deleted review"),
        (status = 404, description = "Review not found"),
    ),
    tag = "Reviews"
)]
pub async fn delete_review(
    State(state): State<AppState>,
    Path((product_id, id)): Path<(i32, i32)>,
) -> AppResult<StatusCode> {
    review_service::delete_review(&state, product_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
