//! Shared HTTP test harness over in-memory stores

#![allow(dead_code)]

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderName, HeaderValue};
use axum_test::{TestRequest, TestServer};

use core_kernel::RiderId;
use domain_delivery::ports::mock::MockOrderStore;
use domain_delivery::proof::mock::MemoryBlobStore;
use domain_payment::ports::mock::MockObligationStore;
use interface_api::auth::{create_token, roles};
use interface_api::config::ApiConfig;
use interface_api::{create_router, AppState};
use test_utils::WebhookFixtures;

pub const JWT_SECRET: &str = "test-jwt-secret";

pub struct TestApp {
    pub server: TestServer,
    pub orders: MockOrderStore,
    pub obligations: MockObligationStore,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(ApiConfig {
            jwt_secret: JWT_SECRET.to_string(),
            webhook_secret: Some(WebhookFixtures::SECRET.to_string()),
            expose_test_webhook: true,
            ..ApiConfig::default()
        })
    }

    pub fn with_config(config: ApiConfig) -> Self {
        let orders = MockOrderStore::new();
        let obligations = MockObligationStore::with_order_store(&orders);
        let state = AppState::new(
            config,
            Arc::new(orders.clone()),
            Arc::new(obligations.clone()),
            Arc::new(MemoryBlobStore::new()),
        );
        let server = TestServer::new(create_router(state)).expect("test server");
        Self {
            server,
            orders,
            obligations,
        }
    }

    /// Posts a provider webhook signed with the shared secret
    pub fn signed_webhook(&self, event_id: &str, minor: i64) -> TestRequest {
        let body = WebhookFixtures::body(event_id, minor);
        let signature = WebhookFixtures::signature(&body);
        self.server
            .post("/webhooks/payrex")
            .add_header(
                HeaderName::from_static("payrex-signature"),
                HeaderValue::from_str(&signature).expect("header value"),
            )
            .bytes(body.into())
    }
}

pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).expect("header value"),
    )
}

pub fn admin_token() -> String {
    create_token("ops-admin", vec![roles::ADMIN.to_string()], JWT_SECRET, 3600).expect("token")
}

pub fn rider_token(rider: RiderId) -> String {
    create_token(&rider.to_string(), vec![roles::RIDER.to_string()], JWT_SECRET, 3600).expect("token")
}

pub trait Authorized {
    fn as_user(self, token: &str) -> Self;
}

impl Authorized for TestRequest {
    fn as_user(self, token: &str) -> Self {
        let (name, value) = bearer(token);
        self.add_header(name, value)
    }
}
