//! Cart and cart item endpoints; every route acts on the caller's own cart

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use super::both;
use crate::{
    error::ApiResult,
    middleware::AuthUser,
    models::{AddCartItem, UpdateCartItem},
    state::AppState,
};

pub fn routes(mut router: Router<AppState>) -> Router<AppState> {
    router = both(
        router,
        "/carts/",
        get(get_cart).post(get_cart).delete(clear_cart),
    );
    router = both(router, "/cart-items/", get(list_items).post(add_item));
    both(
        router,
        "/cart-items/:id/",
        get(get_item).patch(update_item).delete(remove_item),
    )
}

/// Get or create the caller's cart
pub async fn get_cart(
    State(state): State<AppState>,
    caller: AuthUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.carts.cart_view(caller.id).await?))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    caller: AuthUser,
) -> ApiResult<impl IntoResponse> {
    state.carts.clear(caller.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_items(
    State(state): State<AppState>,
    caller: AuthUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.carts.list_items(caller.id).await?))
}

pub async fn add_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(payload): Json<AddCartItem>,
) -> ApiResult<impl IntoResponse> {
    let item = state.carts.add_item(caller.id, payload).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.carts.get_item(caller.id, id).await?))
}

pub async fn update_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCartItem>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.carts.update_item(caller.id, id, payload).await?))
}

pub async fn remove_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.carts.remove_item(caller.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
