//! Order, order item and order status endpoints

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use tracing::instrument;
use uuid::Uuid;

use super::both;
use crate::{
    error::ApiResult,
    middleware::AuthUser,
    models::{NewOrderStatus, OrderChanges, OrderStatusChanges, PageParams, PlaceOrder},
    state::AppState,
};

pub fn routes(mut router: Router<AppState>) -> Router<AppState> {
    router = both(router, "/orders/", get(list_orders).post(place_order));
    router = both(
        router,
        "/orders/:id/",
        get(get_order).patch(update_order).delete(delete_order),
    );
    router = both(router, "/order-items/", get(list_order_items));
    router = both(router, "/order-items/:id/", get(get_order_item));
    router = both(router, "/order-statuses/", get(list_statuses).post(create_status));
    both(
        router,
        "/order-statuses/:id/",
        get(get_status).patch(update_status).delete(delete_status),
    )
}

pub async fn list_orders(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let page = params.resolve(state.default_page_size);
    Ok(Json(state.orders.list_orders(caller.id, page).await?))
}

/// Place an order from the caller's cart; the body is optional
#[instrument(skip(state, caller, payload), fields(user_id = %caller.id))]
pub async fn place_order(
    State(state): State<AppState>,
    caller: AuthUser,
    payload: Option<Json<PlaceOrder>>,
) -> ApiResult<impl IntoResponse> {
    let request = payload.map(|Json(p)| p).unwrap_or_default();
    let order = state.orders.place_order(caller.id, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.orders.get_order(caller.id, id).await?))
}

pub async fn update_order(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<OrderChanges>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.orders.update_order(caller.id, id, payload).await?))
}

pub async fn delete_order(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.orders.delete_order(caller.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_order_items(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let page = params.resolve(state.default_page_size);
    Ok(Json(state.orders.list_order_items(caller.id, page).await?))
}

pub async fn get_order_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.orders.get_order_item(caller.id, id).await?))
}

pub async fn list_statuses(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let page = params.resolve(state.default_page_size);
    Ok(Json(state.orders.list_statuses(page).await?))
}

pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.orders.get_status(id).await?))
}

pub async fn create_status(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(payload): Json<NewOrderStatus>,
) -> ApiResult<impl IntoResponse> {
    let status = state.orders.create_status(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(status)))
}

pub async fn update_status(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<OrderStatusChanges>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.orders.update_status(&caller, id, payload).await?))
}

pub async fn delete_status(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.orders.delete_status(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
