//! API service routes

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{MethodRouter, get},
};
use serde_json::json;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info_span};

use crate::{middleware::auth_middleware, state::AppState};

mod cart;
mod catalog;
mod orders;
mod reviews;

/// Register `path` both with and without its trailing slash
pub(crate) fn both(
    router: Router<AppState>,
    path: &str,
    method_router: MethodRouter<AppState>,
) -> Router<AppState> {
    let bare = path.trim_end_matches('/');
    router
        .route(&format!("{}/", bare), method_router.clone())
        .route(bare, method_router)
}

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new().route("/health", get(health_check));
    router = catalog::routes(router);
    router = reviews::routes(router);
    router = cart::routes(router);
    router = orders::routes(router);

    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
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
    let database = state.catalog.health_check().await;
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if database { "ok" } else { "degraded" },
            "service": "api-service",
            "database": database,
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::header;
    use common::token::{Claims, STAFF_ROLE, TokenType};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn token(user_id: Uuid, roles: &[&str]) -> String {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: user_id,
            email: "caller@example.com".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            iat: now,
            exp: now + 600,
            token_type: TokenType::Access,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    fn staff_token() -> String {
        token(Uuid::new_v4(), &[STAFF_ROLE])
    }

    fn request(
        method: &str,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(bearer) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", bearer));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

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

    async fn create_product(app: &Router, sku: &str, price: &str) -> String {
        let (status, body) = send(
            app,
            request(
                "POST",
                "/products/",
                Some(&staff_token()),
                Some(json!({"name": sku, "price": price, "sku": sku})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = create_router(AppState::fake());
        let (status, body) = send(&app, request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "api-service");
    }

    #[tokio::test]
    async fn catalog_reads_are_public_and_writes_staff_only() {
        let app = create_router(AppState::fake());
        let shopper = token(Uuid::new_v4(), &["user"]);

        let payload = json!({"name": "Mug", "price": "8.5", "sku": "MUG-1"});
        let (status, _) = send(
            &app,
            request("POST", "/products", None, Some(payload.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            request("POST", "/products/", Some(&shopper), Some(payload.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, product) = send(
            &app,
            request("POST", "/products/", Some(&staff_token()), Some(payload.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(product["price"], "8.50");

        let (status, body) = send(
            &app,
            request("POST", "/products/", Some(&staff_token()), Some(payload)),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].is_string());

        let (status, page) = send(&app, request("GET", "/products?page_size=5", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["count"], 1);
        assert_eq!(page["page_size"], 5);
        assert_eq!(page["results"][0]["sku"], "MUG-1");
    }

    #[tokio::test]
    async fn products_filter_by_price_range() {
        let app = create_router(AppState::fake());
        create_product(&app, "CHEAP", "5.00").await;
        create_product(&app, "PRICEY", "50.00").await;

        let (status, page) = send(
            &app,
            request("GET", "/products/?min_price=10&ordering=price", None, None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["count"], 1);
        assert_eq!(page["results"][0]["sku"], "PRICEY");
    }

    #[tokio::test]
    async fn cart_requires_authentication() {
        let app = create_router(AppState::fake());
        let (status, body) = send(&app, request("GET", "/carts/", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) = send(&app, request("GET", "/carts/", Some("not-a-jwt"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn checkout_over_http() {
        let app = create_router(AppState::fake());
        let p1 = create_product(&app, "P1", "100.00").await;
        let p2 = create_product(&app, "P2", "50.00").await;
        let shopper = token(Uuid::new_v4(), &["user"]);

        for (product_id, quantity) in [(&p1, 2), (&p2, 1)] {
            let (status, _) = send(
                &app,
                request(
                    "POST",
                    "/cart-items/",
                    Some(&shopper),
                    Some(json!({"product_id": product_id, "quantity": quantity})),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, cart) = send(&app, request("GET", "/carts", Some(&shopper), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cart["total_items"], 2);
        assert_eq!(cart["total_price"], "250.00");

        let (status, order) = send(&app, request("POST", "/orders/", Some(&shopper), None)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["total"], "250.00");
        assert_eq!(order["status_info"]["name"], "new");
        assert_eq!(order["items"].as_array().unwrap().len(), 2);

        let (_, cart) = send(&app, request("GET", "/carts/", Some(&shopper), None)).await;
        assert_eq!(cart["total_items"], 0);

        let (status, body) = send(&app, request("POST", "/orders/", Some(&shopper), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "cart is empty");

        let other = token(Uuid::new_v4(), &["user"]);
        let uri = format!("/orders/{}/", order["id"].as_str().unwrap());
        let (status, _) = send(&app, request("GET", &uri, Some(&other), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn nested_reviews_reject_duplicates() {
        let app = create_router(AppState::fake());
        let product_id = create_product(&app, "MUG-1", "8.00").await;
        let shopper = token(Uuid::new_v4(), &["user"]);
        let uri = format!("/products/{}/reviews/", product_id);

        let (status, review) = send(
            &app,
            request("POST", &uri, Some(&shopper), Some(json!({"rating": 4}))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(review["rating_stars"], "★★★★☆");
        assert_eq!(review["is_verified_purchase"], false);

        let (status, _) = send(
            &app,
            request(
                "POST",
                "/reviews/",
                Some(&shopper),
                Some(json!({"product": product_id, "rating": 2})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, page) = send(&app, request("GET", &uri, None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["count"], 1);

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/reviews/approve/",
                Some(&staff_token()),
                Some(json!({"ids": [review["id"]]})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["approved"], 1);
    }
}
