//! Order API Handlers
//!
//! Thin JSON layer over the order service. All state-machine and money
//! rules live in the service; handlers validate the wire shape and map
//! domain errors onto HTTP.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use shared::{NewItemInput, Order, Payment, PaymentInput, RoutingManifest, TableRef};
use validator::Validate;

use crate::core::AppState;
use crate::utils::AppResult;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub table_id: Option<String>,
    #[serde(default)]
    pub table_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemsRequest {
    /// Version the terminal believes the order is at; omit to skip the
    /// optimistic check
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[validate(nested, length(min = 1))]
    pub items: Vec<NewItemInput>,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub item_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VoidRequest {
    #[validate(length(min = 1))]
    pub reason: String,
    #[validate(length(min = 1))]
    pub approver_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReopenRequest {
    #[validate(length(min = 1))]
    pub actor_id: String,
    #[validate(length(min = 1))]
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub order: Order,
    pub manifest: RoutingManifest,
}

/// POST /api/orders - open an order (table or tab)
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<Order>> {
    payload.validate()?;
    let table_ref = payload.table_id.map(|table_id| TableRef {
        table_id,
        table_name: payload.table_name,
    });
    let order = state
        .orders
        .create_order(&state.config.venue_id, table_ref)
        .await?;
    Ok(Json(order))
}

/// GET /api/orders - all active orders
pub async fn list_active(State(state): State<AppState>) -> AppResult<Json<Vec<Order>>> {
    Ok(Json(state.orders.get_active_orders()?))
}

/// GET /api/orders/:id
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    Ok(Json(state.orders.get_order(&id)?))
}

/// POST /api/orders/:id/items - add items
pub async fn add_items(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<AddItemsRequest>,
) -> AppResult<Json<Order>> {
    payload.validate()?;
    let order = state
        .orders
        .add_items(&id, payload.expected_version, payload.items)
        .await?;
    Ok(Json(order))
}

/// POST /api/orders/:id/send - flush the un-sent delta to the kitchen
pub async fn send(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SendRequest>,
) -> AppResult<Json<SendResponse>> {
    let (order, manifest) = state.orders.send_to_kitchen(&id, payload.item_ids).await?;
    Ok(Json(SendResponse { order, manifest }))
}

/// POST /api/orders/:id/payments - take payment (idempotent per key)
pub async fn pay(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<PaymentInput>,
) -> AppResult<Json<Payment>> {
    payload.validate()?;
    let payment = state.orders.pay(&id, payload).await?;
    Ok(Json(payment))
}

/// POST /api/orders/:id/items/:item_id/void - strike one item
pub async fn void_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(String, String)>,
    Json(payload): Json<VoidRequest>,
) -> AppResult<Json<Order>> {
    payload.validate()?;
    let order = state
        .orders
        .void_item(&id, &item_id, &payload.reason, &payload.approver_id)
        .await?;
    Ok(Json(order))
}

/// POST /api/orders/:id/void - void the whole order
pub async fn void_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<VoidRequest>,
) -> AppResult<Json<Order>> {
    payload.validate()?;
    let order = state
        .orders
        .void_order(&id, &payload.reason, &payload.approver_id)
        .await?;
    Ok(Json(order))
}

/// POST /api/orders/:id/reopen - reopen a paid order
pub async fn reopen(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ReopenRequest>,
) -> AppResult<Json<Order>> {
    payload.validate()?;
    let order = state
        .orders
        .reopen(&id, &payload.actor_id, &payload.reason)
        .await?;
    Ok(Json(order))
}
