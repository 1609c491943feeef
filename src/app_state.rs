use std::sync::Arc;

use crate::{config::AuthConfig, middleware::JwtVerifier, services::orders::OrderService};

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub jwt: Arc<JwtVerifier>,
}

impl AppState {
    pub fn new(orders: OrderService, auth: &AuthConfig) -> Self {
        Self {
            orders: Arc::new(orders),
            jwt: Arc::new(JwtVerifier::new(&auth.jwt_secret)),
        }
    }
}
