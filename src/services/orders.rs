//! Order business rules.
//!
//! Every operation on an existing order loads it, checks ownership, and only then looks at its
//! status, so a caller who does not own an order can never learn what state it is in. Status
//! changes go through [`Transition`] and are written with a guard on the expected prior status.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    api::Catalog,
    models::{CreateOrderEntity, OrderChangeset, OrderEntity, OrderListResponse, OrderResponse},
    money::{Money, MoneyError},
    order_no::OrderNoGenerator,
    repository::{OrderRepository, PageRequest, RepoError},
    status::{OrderStatus, PaymentStatus, Transition},
};

pub const MIN_SCORE: i16 = 1;
pub const MAX_SCORE: i16 = 5;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    InvalidAmount(#[from] MoneyError),

    #[error("product not found or error fetching product")]
    ProviderNotFound,

    #[error("order not found")]
    NotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("order cannot be {} in current status", .transition.verb())]
    InvalidStateTransition {
        order_no: String,
        status: OrderStatus,
        transition: Transition,
    },

    #[error("failed to {op} order ({key})")]
    PersistenceFailed {
        op: &'static str,
        key: String,
        #[source]
        source: RepoError,
    },

    #[error("order number {0} already exists")]
    Conflict(String),
}

#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub provider_id: i64,
    pub merchant_id: i64,
    pub quantity: i32,
    pub service_time: Option<DateTime<Utc>>,
    pub delivery_address: Value,
}

pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    catalog: Arc<dyn Catalog>,
    order_nos: OrderNoGenerator,
}

impl OrderService {
    pub fn new(repo: Arc<dyn OrderRepository>, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            repo,
            catalog,
            order_nos: OrderNoGenerator::new(),
        }
    }

    /// Places an order at the provider's current price. Payment is treated as immediate, so the
    /// order starts out `Waiting` and `Paid`.
    pub async fn create_order(
        &self,
        user_id: i64,
        req: CreateOrder,
    ) -> Result<OrderResponse, OrderError> {
        if req.provider_id <= 0 || req.merchant_id <= 0 {
            return Err(OrderError::Validation(
                "provider_id and merchant_id are required".into(),
            ));
        }
        let quantity = u32::try_from(req.quantity)
            .ok()
            .filter(|q| *q >= 1)
            .ok_or_else(|| OrderError::Validation("quantity must be at least 1".into()))?;
        if req.delivery_address.is_null() {
            return Err(OrderError::Validation("delivery_address is required".into()));
        }

        let provider = match self.catalog.find_provider_by_id(req.provider_id).await {
            Ok(Some(provider)) => provider,
            Ok(None) => return Err(OrderError::ProviderNotFound),
            Err(err) => {
                warn!(provider_id = req.provider_id, error = ?err, "catalog lookup failed");
                return Err(OrderError::ProviderNotFound);
            }
        };

        // Unusable catalog prices are reported like a missing provider.
        let unit_price = Money::from_f64(provider.price).map_err(|err| {
            error!(provider_id = req.provider_id, price = provider.price, error = %err, "unusable catalog price");
            OrderError::ProviderNotFound
        })?;
        let total_amount = unit_price.times(quantity)?;
        let product_snapshot = json!({
            "title": provider.title,
            "desc": provider.desc,
            "price": unit_price,
            "images": provider.images,
        });

        let now = Utc::now();
        let order_no = self.order_nos.generate(req.merchant_id);
        let created = self
            .repo
            .create(CreateOrderEntity {
                order_no: order_no.clone(),
                user_id,
                provider_id: req.provider_id,
                merchant_id: req.merchant_id,
                product_snapshot,
                unit_price,
                quantity: req.quantity,
                total_amount,
                status: OrderStatus::Waiting,
                payment_status: PaymentStatus::Paid,
                service_time: req.service_time,
                delivery_address: req.delivery_address,
                payment_time: Some(now),
                order_time: now,
            })
            .await
            .map_err(|err| match err {
                RepoError::Conflict(order_no) => {
                    error!(%order_no, "order number collision");
                    OrderError::Conflict(order_no)
                }
                source => {
                    error!(%order_no, error = ?source, "failed to create order");
                    OrderError::PersistenceFailed {
                        op: "create",
                        key: order_no.clone(),
                        source,
                    }
                }
            })?;

        info!(order_no = %created.order_no, user_id, total = %created.total_amount, "order created");
        Ok(OrderResponse::from(&created))
    }

    pub async fn get_order(&self, order_no: &str, user_id: i64) -> Result<OrderResponse, OrderError> {
        let order = self.load_owned(order_no, user_id).await?;
        Ok(OrderResponse::from(&order))
    }

    pub async fn list_orders(
        &self,
        user_id: i64,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<OrderListResponse, OrderError> {
        let (orders, total) = self
            .repo
            .find_by_user(user_id, status, page)
            .await
            .map_err(|source| {
                error!(user_id, error = ?source, "failed to list orders");
                OrderError::PersistenceFailed {
                    op: "list",
                    key: format!("user {user_id}"),
                    source,
                }
            })?;

        Ok(OrderListResponse {
            orders: orders.iter().map(OrderResponse::from).collect(),
            total,
            page: page.page(),
            page_size: page.page_size(),
        })
    }

    /// `Waiting -> Cancelled`, recording when and why.
    pub async fn cancel_order(
        &self,
        order_no: &str,
        user_id: i64,
        reason: Value,
    ) -> Result<(), OrderError> {
        if reason.is_null() {
            return Err(OrderError::Validation("reason is required".into()));
        }
        let order = self.load_owned(order_no, user_id).await?;
        self.transition(&order, Transition::Cancel, OrderChangeset::cancel(reason, Utc::now()))
            .await
    }

    /// `Completed -> Reviewed`, storing the score and tags.
    pub async fn review_order(
        &self,
        order_no: &str,
        user_id: i64,
        score: i16,
        tags: Vec<String>,
    ) -> Result<(), OrderError> {
        if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            return Err(OrderError::Validation(format!(
                "score must be between {MIN_SCORE} and {MAX_SCORE}"
            )));
        }
        let order = self.load_owned(order_no, user_id).await?;
        self.transition(&order, Transition::Review, OrderChangeset::review(score, &tags))
            .await
    }

    async fn load_owned(&self, order_no: &str, user_id: i64) -> Result<OrderEntity, OrderError> {
        let order = self
            .repo
            .find_by_order_no(order_no)
            .await
            .map_err(|source| {
                error!(order_no, error = ?source, "failed to load order");
                OrderError::PersistenceFailed {
                    op: "load",
                    key: order_no.to_string(),
                    source,
                }
            })?
            .ok_or(OrderError::NotFound)?;

        if order.user_id != user_id {
            warn!(order_no, user_id, owner = order.user_id, "order access by non-owner");
            return Err(OrderError::PermissionDenied);
        }
        Ok(order)
    }

    async fn transition(
        &self,
        order: &OrderEntity,
        transition: Transition,
        changes: OrderChangeset,
    ) -> Result<(), OrderError> {
        let refused = || OrderError::InvalidStateTransition {
            order_no: order.order_no.clone(),
            status: order.status,
            transition,
        };

        if transition.apply(order.status).is_none() {
            warn!(
                order_no = %order.order_no,
                status = ?order.status,
                terminal = order.status.is_terminal(),
                "order cannot be {}",
                transition.verb()
            );
            return Err(refused());
        }

        match self
            .repo
            .update_fields(&order.order_no, transition.from(), changes)
            .await
        {
            Ok(()) => {
                info!(order_no = %order.order_no, to = ?transition.to(), "order {}", transition.verb());
                Ok(())
            }
            // Someone else moved the order out of the expected status first.
            Err(RepoError::NotFound) => {
                warn!(order_no = %order.order_no, "concurrent {} lost the race", transition.name());
                Err(refused())
            }
            Err(source) => {
                error!(order_no = %order.order_no, error = ?source, "failed to {} order", transition.name());
                Err(OrderError::PersistenceFailed {
                    op: transition.name(),
                    key: order.order_no.clone(),
                    source,
                })
            }
        }
    }
}
