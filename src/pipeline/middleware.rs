// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum middleware running the guard pipeline.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{Pipeline, RequestContext};
use crate::auth::AuthError;

/// Run the pipeline before the handler.
///
/// On allow, the authenticated principal (if any) is inserted into the
/// request extensions for the [`Auth`](crate::auth::Auth) extractor. On deny,
/// the recorded rejection is returned and the handler never runs.
///
/// Install with `axum::middleware::from_fn_with_state(Arc<Pipeline>, guard_requests)`
/// on the top-level router so guards see the full request path.
pub async fn guard_requests(
    State(pipeline): State<Arc<Pipeline>>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let mut ctx = RequestContext::from_parts(&parts);

    if !pipeline.run(&mut ctx).await {
        return ctx
            .take_rejection()
            .unwrap_or_else(|| AuthError::InternalError("request denied without a reason".into()))
            .into_response();
    }

    if let Some(principal) = ctx.into_principal() {
        parts.extensions.insert(principal);
    }
    next.run(Request::from_parts(parts, body)).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{
        body::{to_bytes, Body},
        http::{header::AUTHORIZATION, Request, StatusCode},
        middleware::from_fn_with_state,
        routing::{get, post},
        Router,
    };
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::{Auth, JwtClaimsExtractor, OptionalAuth};
    use crate::keys::validator::fixtures::Harness;
    use crate::policy::RoutePolicyRegistry;

    const SECRET: &[u8] = b"middleware-test-secret";

    fn token(sub: &str, roles: &[&str], api_key: Option<String>) -> String {
        let mut claims = json!({
            "sub": sub,
            "roles": roles,
            "exp": 4_102_444_800u64,
        });
        if let Some(api_key) = api_key {
            claims["apiKey"] = json!(api_key);
        }
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn registry() -> Arc<RoutePolicyRegistry> {
        let registry = Arc::new(RoutePolicyRegistry::new());
        registry.add_open_path("GET::/health");
        registry.add_roles(
            "POST::/user/:userId/catalogs/:catalogId/view",
            ["user:catalogs:view"],
        );
        registry
    }

    async fn whoami(Auth(principal): Auth) -> String {
        principal.id
    }

    async fn health(OptionalAuth(principal): OptionalAuth) -> String {
        format!("ok:{}", principal.is_some())
    }

    fn app(pipeline: Pipeline) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/user/{user_id}/catalogs/{catalog_id}/view", post(whoami))
            .route("/product/{id}", get(whoami))
            .layer(from_fn_with_state(Arc::new(pipeline), guard_requests))
    }

    fn request(method: &str, uri: &str, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn jwt_pipeline() -> Pipeline {
        Pipeline::builder(registry())
            .authenticate_with(Arc::new(JwtClaimsExtractor::hmac(SECRET)))
            .build()
    }

    #[tokio::test]
    async fn open_route_needs_no_token() {
        let response = app(jwt_pipeline())
            .oneshot(request("GET", "/health", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok:false");
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let response = app(jwt_pipeline())
            .oneshot(request("POST", "/user/abc/catalogs/xyz/view", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error_code"], "missing_auth_header");
    }

    #[tokio::test]
    async fn role_route_grants_matching_role() {
        let bearer = token("user_1", &["user:catalogs:view"], None);
        let response = app(jwt_pipeline())
            .oneshot(request("POST", "/user/abc/catalogs/xyz/view", Some(&bearer)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "user_1");
    }

    #[tokio::test]
    async fn role_route_forbids_other_roles() {
        let bearer = token("user_1", &["user:catalogs:edit"], None);
        let response = app(jwt_pipeline())
            .oneshot(request("POST", "/user/abc/catalogs/xyz/view", Some(&bearer)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(response).await["error_code"],
            "insufficient_permissions"
        );
    }

    #[tokio::test]
    async fn unregistered_route_allows_any_principal() {
        let bearer = token("user_2", &[], None);
        let response = app(jwt_pipeline())
            .oneshot(request("GET", "/product/42", Some(&bearer)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "user_2");
    }

    #[tokio::test]
    async fn head_request_is_guarded_like_get() {
        let registry = registry();
        registry.add_roles("GET::/admin/:section", ["admin"]);
        let pipeline = Pipeline::builder(registry)
            .authenticate_with(Arc::new(JwtClaimsExtractor::hmac(SECRET)))
            .build();

        let hits = Arc::new(AtomicUsize::new(0));
        let counted = {
            let hits = Arc::clone(&hits);
            move |Auth(principal): Auth| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                principal.id
            }
        };
        let app = Router::new()
            .route("/admin/{section}", get(counted))
            .layer(from_fn_with_state(Arc::new(pipeline), guard_requests));

        let client = token("user_1", &["client"], None);
        for method in ["GET", "HEAD"] {
            let response = app
                .clone()
                .oneshot(request(method, "/admin/users", Some(&client)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{method}");
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let response = app
            .clone()
            .oneshot(request("HEAD", "/admin/users", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let admin = token("admin_1", &["admin"], None);
        let response = app
            .oneshot(request("HEAD", "/admin/users", Some(&admin)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn key_validation_end_to_end() {
        let harness = Harness::new();
        let key_pair = harness.validator.key_pair().clone();
        let pipeline = Pipeline::builder(registry())
            .authenticate_with(Arc::new(JwtClaimsExtractor::hmac(SECRET)))
            .with_key_pair(key_pair, harness.keys.clone(), harness.cipher.clone())
            .build();
        let app = app(pipeline);

        let genuine = token("svc_1", &[], Some(harness.sealed_api_key()));
        let response = app
            .clone()
            .oneshot(request("GET", "/product/1", Some(&genuine)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let no_api_key = token("svc_1", &[], None);
        let response = app
            .clone()
            .oneshot(request("GET", "/product/1", Some(&no_api_key)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error_code"], "key_validation_failed");

        harness.register_foreign_key();
        let response = app
            .oneshot(request("GET", "/product/1", Some(&genuine)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
