// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Demo server wiring the guard pipeline in front of a few sample routes.

use std::sync::Arc;

use axum::{
    http::{HeaderName, Method},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use relational_gatekeeper::{
    auth::{JwksManager, JwtClaimsExtractor},
    config::{GatekeeperConfig, TokenVerifier},
    guard_requests,
    keys::{AesGcmCipher, InMemoryAccessKeys},
    logging::init_tracing,
    Auth, OptionalAuth, PipelineBuilder, RoutePattern, RoutePolicyRegistry,
};

const REQUEST_ID: &str = "x-request-id";

#[tokio::main]
async fn main() {
    let config = match GatekeeperConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(config.log_format);

    let registry = Arc::new(RoutePolicyRegistry::new());
    registry.add_open_path("GET::/health");
    registry.add_open_route(RoutePattern::new(Method::GET, "/products/{id}"));
    registry.add_roles(
        "POST::/user/:userId/catalogs/:catalogId/view",
        ["user:catalogs:view"],
    );
    registry.add_roles("GET::/admin/:section", ["admin"]);

    let mut extractor = match &config.token_verifier {
        TokenVerifier::Secret(secret) => JwtClaimsExtractor::hmac(secret.as_bytes()),
        TokenVerifier::Jwks(url) => match JwksManager::new(url) {
            Ok(jwks) => JwtClaimsExtractor::jwks(Arc::new(jwks)),
            Err(e) => {
                error!(error = %e, "Invalid JWKS configuration");
                std::process::exit(1);
            }
        },
    };
    if let Some(issuer) = &config.issuer {
        extractor = extractor.with_issuer(issuer);
    }
    if let Some(audience) = &config.audience {
        extractor = extractor.with_audience(audience);
    }

    let mut builder = PipelineBuilder::new(registry)
        .authenticate_with(Arc::new(extractor))
        .unregistered_routes(config.unregistered_routes);

    if let Some(key_config) = &config.key_validation {
        let cipher = match AesGcmCipher::from_base64(&key_config.cipher_key) {
            Ok(cipher) => Arc::new(cipher),
            Err(e) => {
                error!(error = %e, "Invalid access key cipher key");
                std::process::exit(1);
            }
        };
        let access_keys = Arc::new(InMemoryAccessKeys::new());
        for (api_key_id, sealed) in &key_config.access_keys {
            access_keys.insert(api_key_id.clone(), sealed.clone());
        }
        if access_keys.is_empty() {
            warn!("ACCESS_KEYS is empty, every key-validated request will be denied");
        } else {
            info!(count = access_keys.len(), "Loaded access keys");
        }
        builder = match builder.install_key_validator(
            &key_config.private_key_path,
            access_keys,
            cipher,
        ) {
            Ok(builder) => builder,
            Err(e) => {
                error!(
                    path = %key_config.private_key_path.display(),
                    error = %e,
                    "Failed to load server private key"
                );
                std::process::exit(1);
            }
        };
    } else {
        warn!("SERVER_PRIVATE_KEY_PATH not set, key-pair validation disabled");
    }

    let pipeline = Arc::new(builder.build());
    info!(guards = ?pipeline.guard_names(), "Guard pipeline ready");

    let request_id = HeaderName::from_static(REQUEST_ID);
    let app = Router::new()
        .route("/health", get(health))
        .route("/products/{id}", get(health))
        .route("/user/{user_id}/catalogs/{catalog_id}/view", post(whoami))
        .route("/admin/{section}", get(whoami))
        .route("/me", get(whoami))
        .layer(middleware::from_fn_with_state(pipeline, guard_requests))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive());

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.bind_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };
    info!(addr = %config.bind_addr, "Gatekeeper demo listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

async fn health(OptionalAuth(principal): OptionalAuth) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "authenticated": principal.is_some(),
    }))
}

async fn whoami(Auth(principal): Auth) -> Json<Value> {
    Json(json!({
        "id": principal.id,
        "roles": principal.roles,
        "api_key_id": principal.api_key_id,
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
