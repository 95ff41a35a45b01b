//! Review endpoints, top level and nested under a product

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use uuid::Uuid;

use super::both;
use crate::{
    error::ApiResult,
    middleware::AuthUser,
    models::{ApproveReviews, NewReview, PageParams, ReviewChanges, SetVerifiedPurchase},
    state::AppState,
};

pub fn routes(mut router: Router<AppState>) -> Router<AppState> {
    router = both(
        router,
        "/products/:id/reviews/",
        get(list_product_reviews).post(create_product_review),
    );
    router = both(router, "/reviews/", get(list_my_reviews).post(create_review));
    router = both(router, "/reviews/approve/", post(approve_reviews));
    router = both(
        router,
        "/reviews/:id/",
        get(get_review).patch(update_review).delete(delete_review),
    );
    both(
        router,
        "/reviews/:id/verified-purchase/",
        post(set_verified_purchase),
    )
}

pub async fn list_product_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let page = params.resolve(state.default_page_size);
    Ok(Json(state.reviews.list_product_reviews(product_id, page).await?))
}

pub async fn create_product_review(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<NewReview>,
) -> ApiResult<impl IntoResponse> {
    let review = state
        .reviews
        .create_review(&caller, Some(product_id), payload)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn list_my_reviews(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let page = params.resolve(state.default_page_size);
    Ok(Json(state.reviews.list_user_reviews(caller.id, page).await?))
}

pub async fn create_review(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(payload): Json<NewReview>,
) -> ApiResult<impl IntoResponse> {
    let review = state.reviews.create_review(&caller, None, payload).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.reviews.get_review(id).await?))
}

pub async fn update_review(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewChanges>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.reviews.update_review(&caller, id, payload).await?))
}

pub async fn delete_review(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.reviews.delete_review(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn approve_reviews(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(payload): Json<ApproveReviews>,
) -> ApiResult<impl IntoResponse> {
    let approved = state.reviews.approve(&caller, &payload.ids).await?;
    Ok(Json(json!({ "approved": approved })))
}

pub async fn set_verified_purchase(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetVerifiedPurchase>,
) -> ApiResult<impl IntoResponse> {
    let review = state
        .reviews
        .set_verified_purchase(&caller, id, payload.is_verified_purchase)
        .await?;
    Ok(Json(review))
}
