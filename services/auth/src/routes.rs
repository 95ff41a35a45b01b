//! Authentication service routes

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde_json::json;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info_span, instrument};
use uuid::Uuid;

use crate::{
    error::AuthResult,
    middleware::AuthUser,
    models::{
        AssignRole, LoginRequest, NewRole, RefreshRequest, RegisterRequest, UpdateProfile,
        UpdateRole, UpdateUser,
    },
    state::AppState,
};

/// Register `path` both with and without its trailing slash
fn both<S: Clone + Send + Sync + 'static>(
    router: Router<S>,
    path: &str,
    method_router: axum::routing::MethodRouter<S>,
) -> Router<S> {
    let bare = path.trim_end_matches('/');
    router
        .route(&format!("{}/", bare), method_router.clone())
        .route(bare, method_router)
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new().route("/health", get(health_check));
    router = both(router, "/auth/register/", post(register));
    router = both(router, "/auth/login/", post(login));
    router = both(router, "/auth/refresh/", post(refresh_token));
    router = both(router, "/auth/profile/", get(get_profile).patch(update_profile));
    router = both(router, "/users/", get(list_users));
    router = both(router, "/users/:id/", get(get_user).patch(update_user));
    router = both(router, "/users/:id/roles/", get(list_user_roles).post(assign_role));
    router = both(router, "/users/:id/roles/:role_id/", delete(revoke_role));
    router = both(router, "/roles/", get(list_roles).post(create_role));
    router = both(
        router,
        "/roles/:id/",
        get(get_role).patch(update_role).delete(delete_role),
    );

    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    info_span!("http_request", method = %request.method(), uri = %request.uri())
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = state.accounts.health_check().await;
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if database { "ok" } else { "degraded" },
            "service": "auth-service",
            "database": database,
        })),
    )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AuthResult<impl IntoResponse> {
    let user = state.accounts.register(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AuthResult<impl IntoResponse> {
    let response = state.accounts.login(payload).await?;
    Ok(Json(response))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AuthResult<impl IntoResponse> {
    let response = state.accounts.refresh(&payload.refresh).await?;
    Ok(Json(response))
}

pub async fn get_profile(
    State(state): State<AppState>,
    caller: AuthUser,
) -> AuthResult<impl IntoResponse> {
    Ok(Json(state.accounts.profile(caller.id).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(payload): Json<UpdateProfile>,
) -> AuthResult<impl IntoResponse> {
    Ok(Json(state.accounts.update_profile(caller.id, &payload).await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    caller: AuthUser,
) -> AuthResult<impl IntoResponse> {
    Ok(Json(state.accounts.list_users(&caller).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> AuthResult<impl IntoResponse> {
    Ok(Json(state.accounts.get_user(&caller, id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUser>,
) -> AuthResult<impl IntoResponse> {
    Ok(Json(state.accounts.update_user(&caller, id, payload).await?))
}

pub async fn list_user_roles(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> AuthResult<impl IntoResponse> {
    Ok(Json(state.accounts.list_user_roles(&caller, id).await?))
}

pub async fn assign_role(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRole>,
) -> AuthResult<impl IntoResponse> {
    let assignment = state
        .accounts
        .assign_role(&caller, id, payload.role_id)
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn revoke_role(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((id, role_id)): Path<(Uuid, Uuid)>,
) -> AuthResult<impl IntoResponse> {
    state.accounts.revoke_role(&caller, id, role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_roles(State(state): State<AppState>) -> AuthResult<impl IntoResponse> {
    Ok(Json(state.accounts.list_roles().await?))
}

pub async fn get_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AuthResult<impl IntoResponse> {
    Ok(Json(state.accounts.get_role(id).await?))
}

pub async fn create_role(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(payload): Json<NewRole>,
) -> AuthResult<impl IntoResponse> {
    let role = state.accounts.create_role(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn update_role(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRole>,
) -> AuthResult<impl IntoResponse> {
    Ok(Json(state.accounts.update_role(&caller, id, payload).await?))
}

pub async fn delete_role(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> AuthResult<impl IntoResponse> {
    state.accounts.delete_role(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::header;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn register_login_and_read_profile() {
        let app = create_router(AppState::fake());

        let (status, user) = send(
            &app,
            post_json(
                "/auth/register/",
                json!({
                    "email": "jane@example.com",
                    "password": "sup3rsecret",
                    "password_confirm": "sup3rsecret",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(user["roles"][0]["role"]["name"], "user");
        assert!(user.get("password_hash").is_none());

        let (status, tokens) = send(
            &app,
            post_json(
                "/auth/login",
                json!({"email": "jane@example.com", "password": "sup3rsecret"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let access = tokens["access"].as_str().unwrap().to_string();

        let request = Request::builder()
            .uri("/auth/profile/")
            .header(header::AUTHORIZATION, format!("Bearer {}", access))
            .body(Body::empty())
            .unwrap();
        let (status, profile) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["city"], "");
    }

    #[tokio::test]
    async fn profile_requires_a_token() {
        let app = create_router(AppState::fake());
        let request = Request::builder()
            .uri("/auth/profile/")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn mismatched_passwords_are_a_bad_request() {
        let app = create_router(AppState::fake());
        let (status, body) = send(
            &app,
            post_json(
                "/auth/register/",
                json!({
                    "email": "jane@example.com",
                    "password": "sup3rsecret",
                    "password_confirm": "different1",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Passwords do not match");
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = create_router(AppState::fake());
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "auth-service");
    }
}
