//! Category, product and product image endpoints

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use super::both;
use crate::{
    error::ApiResult,
    middleware::AuthUser,
    models::{
        CategoryChanges, CategoryFilter, ImageChanges, ImageFilter, NewCategory, NewImage,
        NewProduct, PageParams, ProductChanges, ProductFilter,
    },
    state::AppState,
};

pub fn routes(mut router: Router<AppState>) -> Router<AppState> {
    router = both(router, "/categories/", get(list_categories).post(create_category));
    router = both(
        router,
        "/categories/:id/",
        get(get_category)
            .patch(update_category)
            .delete(delete_category),
    );
    router = both(router, "/products/", get(list_products).post(create_product));
    router = both(
        router,
        "/products/:id/",
        get(get_product).patch(update_product).delete(delete_product),
    );
    router = both(router, "/product-images/", get(list_images).post(create_image));
    both(
        router,
        "/product-images/:id/",
        get(get_image).patch(update_image).delete(delete_image),
    )
}

pub async fn list_categories(
    State(state): State<AppState>,
    Query(filter): Query<CategoryFilter>,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let page = params.resolve(state.default_page_size);
    Ok(Json(state.catalog.list_categories(&filter, page).await?))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.catalog.get_category(id).await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(payload): Json<NewCategory>,
) -> ApiResult<impl IntoResponse> {
    let category = state.catalog.create_category(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryChanges>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.catalog.update_category(&caller, id, payload).await?))
}

pub async fn delete_category(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.catalog.delete_category(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let page = params.resolve(state.default_page_size);
    Ok(Json(state.catalog.list_products(&filter, page).await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.catalog.get_product(id).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(payload): Json<NewProduct>,
) -> ApiResult<impl IntoResponse> {
    let product = state.catalog.create_product(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProductChanges>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.catalog.update_product(&caller, id, payload).await?))
}

pub async fn delete_product(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.catalog.delete_product(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_images(
    State(state): State<AppState>,
    Query(filter): Query<ImageFilter>,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let page = params.resolve(state.default_page_size);
    Ok(Json(state.catalog.list_images(&filter, page).await?))
}

pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.catalog.get_image(id).await?))
}

pub async fn create_image(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(payload): Json<NewImage>,
) -> ApiResult<impl IntoResponse> {
    let image = state.catalog.create_image(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn update_image(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ImageChanges>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.catalog.update_image(&caller, id, payload).await?))
}

pub async fn delete_image(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.catalog.delete_image(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
