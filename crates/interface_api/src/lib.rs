//! HTTP API Layer
//!
//! REST API over the [`PaymentOrchestrator`] using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: one module per resource (recharges, installments, wallet)
//! - **Middleware**: bearer authentication and audit logging
//! - **DTOs**: request/response bodies
//! - **Error Handling**: domain errors mapped to status codes
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(orchestrator, config).with_sandbox(gateway);
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use domain_recharge::{PaymentOrchestrator, SandboxGateway};

use crate::config::ApiConfig;
use crate::handlers::{health, installments, recharge, sandbox, wallet};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PaymentOrchestrator>,
    /// Set when the in-process sandbox gateway stands in for a real one
    pub sandbox: Option<Arc<SandboxGateway>>,
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(orchestrator: Arc<PaymentOrchestrator>, config: ApiConfig) -> Self {
        Self {
            orchestrator,
            sandbox: None,
            config,
        }
    }

    /// Exposes `POST /sandbox/gateway/:transaction_id`
    pub fn with_sandbox(mut self, gateway: Arc<SandboxGateway>) -> Self {
        self.sandbox = Some(gateway);
        self
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let mut public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));
    if state.sandbox.is_some() {
        public_routes =
            public_routes.route("/sandbox/gateway/:transaction_id", post(sandbox::resolve_payment));
    }

    let recharge_routes = Router::new()
        .route("/", post(recharge::create_recharge))
        .route("/:transaction_id", get(recharge::get_recharge))
        .route("/:transaction_id/verify", post(recharge::verify_recharge));

    let installment_routes = Router::new()
        .route("/", get(installments::list_installments))
        .route("/:id/pay", post(installments::pay_installment))
        .route("/payments/:transaction_id", get(installments::get_installment_payment))
        .route(
            "/payments/:transaction_id/verify",
            post(installments::verify_installment_payment),
        );

    // Protected API routes
    let api_routes = Router::new()
        .route("/plans/:id/quote", get(recharge::quote))
        .nest("/recharges", recharge_routes)
        .nest("/installments", installment_routes)
        .route("/wallet", get(wallet::get_wallet))
        .layer(axum_middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}
