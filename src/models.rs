use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{AsChangeset, Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::{
    money::Money,
    status::{OrderStatus, PaymentStatus, Transition},
};

// Orders

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: i64,
    pub order_no: String,
    pub user_id: i64,
    pub provider_id: i64,
    pub merchant_id: i64,
    pub product_snapshot: Value,
    pub unit_price: Money,
    pub quantity: i32,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub service_time: Option<DateTime<Utc>>,
    pub delivery_address: Value,
    pub payment_time: Option<DateTime<Utc>>,
    pub order_time: DateTime<Utc>,
    pub accepted_time: Option<DateTime<Utc>>,
    pub completion_time: Option<DateTime<Utc>>,
    pub cancellation_time: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<Value>,
    pub score: Option<i16>,
    pub tags: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderEntity {
    pub order_no: String,
    pub user_id: i64,
    pub provider_id: i64,
    pub merchant_id: i64,
    pub product_snapshot: Value,
    pub unit_price: Money,
    pub quantity: i32,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub service_time: Option<DateTime<Utc>>,
    pub delivery_address: Value,
    pub payment_time: Option<DateTime<Utc>>,
    pub order_time: DateTime<Utc>,
}

/// Columns a status transition may write. `None` fields are left untouched.
#[derive(AsChangeset, Debug, Clone, Default, PartialEq)]
#[diesel(table_name = crate::schema::orders)]
pub struct OrderChangeset {
    pub status: Option<OrderStatus>,
    pub cancellation_time: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<Value>,
    pub score: Option<i16>,
    pub tags: Option<Value>,
}

impl OrderChangeset {
    pub fn cancel(reason: Value, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(Transition::Cancel.to()),
            cancellation_time: Some(at),
            cancellation_reason: Some(reason),
            ..Default::default()
        }
    }

    pub fn review(score: i16, tags: &[String]) -> Self {
        Self {
            status: Some(Transition::Review.to()),
            score: Some(score),
            tags: Some(Value::from(tags.to_vec())),
            ..Default::default()
        }
    }
}

// Responses

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct OrderResponse {
    pub order_no: String,
    pub user_id: i64,
    pub provider_id: i64,
    pub product_snapshot: Value,
    #[schema(value_type = String, example = "50.00")]
    pub unit_price: Money,
    pub quantity: i32,
    #[schema(value_type = String, example = "150.00")]
    pub total_amount: Money,
    #[schema(value_type = i16)]
    pub status: OrderStatus,
    pub status_text: String,
    #[schema(value_type = i16)]
    pub payment_status: PaymentStatus,
    pub payment_status_text: String,
    pub service_time: Option<DateTime<Utc>>,
    pub delivery_address: Value,
    pub payment_time: Option<DateTime<Utc>>,
    pub order_time: DateTime<Utc>,
    pub accepted_time: Option<DateTime<Utc>>,
    pub completion_time: Option<DateTime<Utc>>,
    pub cancellation_time: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<Value>,
    pub score: Option<i16>,
    pub tags: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl From<&OrderEntity> for OrderResponse {
    fn from(order: &OrderEntity) -> Self {
        Self {
            order_no: order.order_no.clone(),
            user_id: order.user_id,
            provider_id: order.provider_id,
            product_snapshot: order.product_snapshot.clone(),
            unit_price: order.unit_price,
            quantity: order.quantity,
            total_amount: order.total_amount,
            status: order.status,
            status_text: order.status.text().to_string(),
            payment_status: order.payment_status,
            payment_status_text: order.payment_status.text().to_string(),
            service_time: order.service_time,
            delivery_address: order.delivery_address.clone(),
            payment_time: order.payment_time,
            order_time: order.order_time,
            accepted_time: order.accepted_time,
            completion_time: order.completion_time,
            cancellation_time: order.cancellation_time,
            cancellation_reason: order.cancellation_reason.clone(),
            score: order.score,
            tags: order.tags.clone(),
            created_at: order.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::sample_order;

    #[test]
    fn test_mapping_adds_status_text() {
        let order = sample_order("17000000000001000001", 7, OrderStatus::Waiting);
        let response = OrderResponse::from(&order);

        assert_eq!(response.order_no, order.order_no);
        assert_eq!(response.status_text, "待接单");
        assert_eq!(response.payment_status_text, "已支付");
        assert_eq!(response.total_amount, order.total_amount);
        assert_eq!(response.delivery_address, order.delivery_address);
        assert_eq!(response.created_at, order.created_at);
    }

    #[test]
    fn test_completed_label() {
        let order = sample_order("17000000000001000002", 7, OrderStatus::Completed);
        assert_eq!(OrderResponse::from(&order).status_text, "已完成");
    }

    #[test]
    fn test_response_json_shape() {
        let order = sample_order("17000000000001000003", 7, OrderStatus::Cancelled);
        let value = serde_json::to_value(OrderResponse::from(&order)).unwrap();

        assert_eq!(value["status"], json!(4));
        assert_eq!(value["status_text"], json!("已取消"));
        assert_eq!(value["unit_price"], json!("50.00"));
        assert_eq!(value["total_amount"], json!("150.00"));
        assert!(value.get("id").is_none());
        assert!(value.get("deleted_at").is_none());
    }

    #[test]
    fn test_changesets_only_touch_their_fields() {
        let now = Utc::now();
        let cancel = OrderChangeset::cancel(json!(["changed mind"]), now);
        assert_eq!(cancel.status, Some(OrderStatus::Cancelled));
        assert_eq!(cancel.cancellation_time, Some(now));
        assert_eq!(cancel.score, None);

        let review = OrderChangeset::review(5, &["fast".to_string()]);
        assert_eq!(review.status, Some(OrderStatus::Reviewed));
        assert_eq!(review.tags, Some(json!(["fast"])));
        assert_eq!(review.cancellation_time, None);
    }
}
