use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware::{self, CallerId},
    models::{OrderListResponse, OrderResponse},
    repository::PageRequest,
    services::orders::CreateOrder,
    status::OrderStatus,
};

/// Order routes; every one of them requires a bearer token.
pub fn routes_with_openapi(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_order, list_orders))
        .routes(utoipa_axum::routes!(get_order))
        .routes(utoipa_axum::routes!(cancel_order))
        .routes(utoipa_axum::routes!(review_order))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::users_authorization,
        ))
}

#[derive(Deserialize, ToSchema)]
struct CreateOrderReq {
    provider_id: i64,
    merchant_id: i64,
    quantity: i32,
    #[serde(default)]
    service_time: Option<DateTime<Utc>>,
    #[serde(default)]
    delivery_address: Value,
}

/// Place an order for a provider at its current price.
#[utoipa::path(
    post,
    path = "/api/orders",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    request_body = CreateOrderReq,
    responses(
        (status = 201, description = "Order created", body = StdResponse<OrderResponse>),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Provider not found")
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Extension(CallerId(user_id)): Extension<CallerId>,
    payload: Result<Json<CreateOrderReq>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    let order = state
        .orders
        .create_order(
            user_id,
            CreateOrder {
                provider_id: req.provider_id,
                merchant_id: req.merchant_id,
                quantity: req.quantity,
                service_time: req.service_time,
                delivery_address: req.delivery_address,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, StdResponse::ok(order)))
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ListOrdersParams {
    /// Status code to filter by.
    status: Option<i16>,
    /// Non-numeric values fall back to the first page.
    #[param(value_type = Option<i64>)]
    page: Option<String>,
    /// Non-numeric values fall back to the default page size.
    #[serde(rename = "pageSize")]
    #[param(value_type = Option<i64>)]
    page_size: Option<String>,
}

fn lenient(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse().ok())
}

/// List the caller's orders, newest first.
#[utoipa::path(
    get,
    path = "/api/orders",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(ListOrdersParams),
    responses(
        (status = 200, description = "List my orders", body = StdResponse<OrderListResponse>),
        (status = 400, description = "Invalid status parameter")
    )
)]
async fn list_orders(
    State(state): State<AppState>,
    Extension(CallerId(user_id)): Extension<CallerId>,
    params: Result<Query<ListOrdersParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params?;
    let status = params
        .status
        .map(OrderStatus::try_from)
        .transpose()
        .map_err(|_| AppError::BadRequest("invalid status parameter".into()))?;
    let page = PageRequest::normalize(
        lenient(params.page.as_deref()),
        lenient(params.page_size.as_deref()),
    );

    let orders = state.orders.list_orders(user_id, status, page).await?;
    Ok(StdResponse::ok(orders))
}

/// Fetch one of the caller's orders.
#[utoipa::path(
    get,
    path = "/api/orders/{order_no}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("order_no" = String, Path, description = "Order number")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<OrderResponse>),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Order not found")
    )
)]
async fn get_order(
    State(state): State<AppState>,
    Extension(CallerId(user_id)): Extension<CallerId>,
    Path(order_no): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.orders.get_order(&order_no, user_id).await?;
    Ok(StdResponse::ok(order))
}

#[derive(Deserialize, ToSchema)]
struct CancelOrderReq {
    #[serde(default)]
    reason: Value,
}

/// Cancel an order that no provider has accepted yet.
#[utoipa::path(
    patch,
    path = "/api/orders/{order_no}/cancel",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("order_no" = String, Path, description = "Order number")
    ),
    request_body = CancelOrderReq,
    responses(
        (status = 200, description = "Order cancelled", body = StdResponse<String>),
        (status = 400, description = "Order cannot be cancelled in its current status"),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Order not found")
    )
)]
async fn cancel_order(
    State(state): State<AppState>,
    Extension(CallerId(user_id)): Extension<CallerId>,
    Path(order_no): Path<String>,
    payload: Result<Json<CancelOrderReq>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    state
        .orders
        .cancel_order(&order_no, user_id, req.reason)
        .await?;
    Ok(StdResponse::ok("Order cancelled successfully"))
}

#[derive(Deserialize, ToSchema)]
struct ReviewOrderReq {
    #[serde(default)]
    order_no: Option<String>,
    score: i16,
    #[serde(default)]
    tags: Vec<String>,
}

/// Review a completed order.
#[utoipa::path(
    post,
    path = "/api/orders/{order_no}/review",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("order_no" = String, Path, description = "Order number")
    ),
    request_body = ReviewOrderReq,
    responses(
        (status = 200, description = "Order reviewed", body = StdResponse<String>),
        (status = 400, description = "Invalid score or order not completed"),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Order not found")
    )
)]
async fn review_order(
    State(state): State<AppState>,
    Extension(CallerId(user_id)): Extension<CallerId>,
    Path(order_no): Path<String>,
    payload: Result<Json<ReviewOrderReq>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    if req.order_no.as_deref().is_some_and(|no| no != order_no) {
        return Err(AppError::BadRequest(
            "order_no does not match the request path".into(),
        ));
    }

    state
        .orders
        .review_order(&order_no, user_id, req.score, req.tags)
        .await?;
    Ok(StdResponse::ok("Order review successfully"))
}
