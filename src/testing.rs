//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;

use crate::{
    api::{Catalog, Provider},
    middleware::Claims,
    models::{CreateOrderEntity, OrderChangeset, OrderEntity},
    money::Money,
    repository::{OrderRepository, PageRequest, RepoError},
    status::{OrderStatus, PaymentStatus},
};

pub const JWT_SECRET: &str = "test-secret";

/// Mirrors the Postgres repository's semantics, including the status-guarded update.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    rows: Mutex<Vec<OrderEntity>>,
    next_id: AtomicI64,
    offline: AtomicBool,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stands in for the fulfillment workflow, which moves orders to `Accepted`/`Completed`.
    pub fn force_status(&self, order_no: &str, status: OrderStatus) {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.iter_mut().find(|o| o.order_no == order_no).unwrap();
        row.status = status;
    }

    pub fn insert(&self, order: OrderEntity) {
        self.rows.lock().unwrap().push(order);
    }

    pub fn snapshot(&self, order_no: &str) -> OrderEntity {
        let rows = self.rows.lock().unwrap();
        rows.iter().find(|o| o.order_no == order_no).cloned().unwrap()
    }

    pub fn fail_writes(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    fn check_writable(&self, op: &'static str, key: &str) -> Result<(), RepoError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepoError::storage(op, key, "storage offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: CreateOrderEntity) -> Result<OrderEntity, RepoError> {
        self.check_writable("create", &order.order_no)?;
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|o| o.order_no == order.order_no) {
            return Err(RepoError::Conflict(order.order_no));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        // Strictly increasing so "newest first" is deterministic.
        let created_at = Utc::now() + Duration::milliseconds(id);
        let entity = OrderEntity {
            id,
            order_no: order.order_no,
            user_id: order.user_id,
            provider_id: order.provider_id,
            merchant_id: order.merchant_id,
            product_snapshot: order.product_snapshot,
            unit_price: order.unit_price,
            quantity: order.quantity,
            total_amount: order.total_amount,
            status: order.status,
            payment_status: order.payment_status,
            service_time: order.service_time,
            delivery_address: order.delivery_address,
            payment_time: order.payment_time,
            order_time: order.order_time,
            accepted_time: None,
            completion_time: None,
            cancellation_time: None,
            cancellation_reason: None,
            score: None,
            tags: None,
            created_at,
            updated_at: created_at,
            deleted_at: None,
        };
        rows.push(entity.clone());
        Ok(entity)
    }

    async fn find_by_order_no(&self, order_no: &str) -> Result<Option<OrderEntity>, RepoError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|o| o.order_no == order_no && o.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_user(
        &self,
        user_id: i64,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<(Vec<OrderEntity>, i64), RepoError> {
        let rows = self.rows.lock().unwrap();
        let mut matching: Vec<OrderEntity> = rows
            .iter()
            .filter(|o| o.user_id == user_id && o.deleted_at.is_none())
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let orders = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size() as usize)
            .collect();
        Ok((orders, total))
    }

    async fn update_fields(
        &self,
        order_no: &str,
        expected: OrderStatus,
        changes: OrderChangeset,
    ) -> Result<(), RepoError> {
        self.check_writable("update_fields", order_no)?;
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows
            .iter_mut()
            .find(|o| o.order_no == order_no && o.status == expected && o.deleted_at.is_none())
        else {
            return Err(RepoError::NotFound);
        };

        if let Some(status) = changes.status {
            row.status = status;
        }
        if let Some(at) = changes.cancellation_time {
            row.cancellation_time = Some(at);
        }
        if let Some(reason) = changes.cancellation_reason {
            row.cancellation_reason = Some(reason);
        }
        if let Some(score) = changes.score {
            row.score = Some(score);
        }
        if let Some(tags) = changes.tags {
            row.tags = Some(tags);
        }
        row.updated_at = Utc::now();
        Ok(())
    }
}

/// Catalog backed by a fixed map. Provider id 500 simulates an unreachable catalog.
pub struct StaticCatalog {
    providers: HashMap<i64, Provider>,
}

pub const UNREACHABLE_PROVIDER: i64 = 500;

impl StaticCatalog {
    pub fn new(providers: impl IntoIterator<Item = Provider>) -> Self {
        Self {
            providers: providers.into_iter().map(|p| (p.id, p)).collect(),
        }
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::new([provider(1, 50.0), provider(2, 0.1)])
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn find_provider_by_id(&self, id: i64) -> Result<Option<Provider>> {
        if id == UNREACHABLE_PROVIDER {
            return Err(anyhow!("catalog unreachable"));
        }
        Ok(self.providers.get(&id).cloned())
    }
}

pub fn provider(id: i64, price: f64) -> Provider {
    Provider {
        id,
        user_id: 100 + id,
        title: format!("Provider {id}"),
        desc: "Home cleaning, two hours".to_string(),
        price,
        images: vec![format!("https://img.example/{id}.jpg")],
    }
}

/// An insertable order for user `user_id` at 50.00 x 3.
pub fn new_order(order_no: &str, user_id: i64) -> CreateOrderEntity {
    let unit_price: Money = "50.00".parse().unwrap();
    let now = Utc::now();
    CreateOrderEntity {
        order_no: order_no.to_string(),
        user_id,
        provider_id: 1,
        merchant_id: 3,
        product_snapshot: json!({"title": "Provider 1", "price": "50.00"}),
        unit_price,
        quantity: 3,
        total_amount: unit_price.times(3).unwrap(),
        status: OrderStatus::Waiting,
        payment_status: PaymentStatus::Paid,
        service_time: None,
        delivery_address: json!({"city": "Shenzhen", "detail": "Nanshan 1"}),
        payment_time: Some(now),
        order_time: now,
    }
}

/// A fully populated row, as the repository would return it.
pub fn sample_order(order_no: &str, user_id: i64, status: OrderStatus) -> OrderEntity {
    let created_at = Utc.with_ymd_and_hms(2025, 5, 1, 8, 30, 0).unwrap();
    let unit_price: Money = "50.00".parse().unwrap();
    OrderEntity {
        id: 1,
        order_no: order_no.to_string(),
        user_id,
        provider_id: 1,
        merchant_id: 3,
        product_snapshot: json!({"title": "Provider 1", "price": "50.00"}),
        unit_price,
        quantity: 3,
        total_amount: unit_price.times(3).unwrap(),
        status,
        payment_status: PaymentStatus::Paid,
        service_time: None,
        delivery_address: json!({"city": "Shenzhen"}),
        payment_time: Some(created_at),
        order_time: created_at,
        accepted_time: None,
        completion_time: None,
        cancellation_time: None,
        cancellation_reason: None,
        score: None,
        tags: None,
        created_at,
        updated_at: created_at,
        deleted_at: None,
    }
}

pub fn bearer_token(user_id: u64) -> String {
    let claims = Claims {
        user_id,
        accid: format!("acc{user_id}"),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as u64,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {token}")
}
