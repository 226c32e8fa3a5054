//! Admin API handlers.
//!
//! Every handler takes [`RequireAdmin`], so a missing or wrong bearer token
//! is rejected before any store is touched. The admin UI polls these
//! endpoints; there is no push channel.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use larkspur_core::{AdminNotification, NotificationId, Order, OrderId, OrderStatus, PaymentStatus};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::services::admin::{self as admin_service, Dashboard};
use crate::state::AppState;
use crate::store::{Backend, NotificationStore};

const DEFAULT_PAGE_SIZE: u32 = 50;
const DEFAULT_FEED_SIZE: u32 = 50;
const MAX_FEED_SIZE: u32 = 200;

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub success: bool,
    pub orders: Vec<Order>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub order: Order,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusUpdate {
    pub payment_status: PaymentStatus,
}

/// GET /admin/api/orders
pub async fn list_orders<B: Backend>(
    _admin: RequireAdmin,
    State(state): State<AppState<B>>,
    Query(page): Query<PageQuery>,
) -> Result<Json<OrdersResponse>> {
    let orders = admin_service::list_orders(
        state.backend().orders(),
        page.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        page.offset.unwrap_or(0),
    )
    .await?;
    Ok(Json(OrdersResponse {
        success: true,
        orders,
    }))
}

/// GET /admin/api/orders/{id}
pub async fn order_detail<B: Backend>(
    _admin: RequireAdmin,
    State(state): State<AppState<B>>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>> {
    let order = admin_service::get_order(state.backend().orders(), id).await?;
    Ok(Json(OrderResponse {
        success: true,
        order,
    }))
}

/// POST /admin/api/orders/{id}/status
#[instrument(skip(_admin, state))]
pub async fn update_status<B: Backend>(
    _admin: RequireAdmin,
    State(state): State<AppState<B>>,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<OrderResponse>> {
    let order = admin_service::update_status(state.backend().orders(), id, body.status).await?;
    Ok(Json(OrderResponse {
        success: true,
        order,
    }))
}

/// POST /admin/api/orders/{id}/payment-status
#[instrument(skip(_admin, state))]
pub async fn update_payment_status<B: Backend>(
    _admin: RequireAdmin,
    State(state): State<AppState<B>>,
    Path(id): Path<OrderId>,
    Json(body): Json<PaymentStatusUpdate>,
) -> Result<Json<OrderResponse>> {
    let order =
        admin_service::update_payment_status(state.backend().orders(), id, body.payment_status)
            .await?;
    Ok(Json(OrderResponse {
        success: true,
        order,
    }))
}

/// DELETE /admin/api/orders/{id}
#[instrument(skip(_admin, state))]
pub async fn delete_order<B: Backend>(
    _admin: RequireAdmin,
    State(state): State<AppState<B>>,
    Path(id): Path<OrderId>,
) -> Result<StatusCode> {
    admin_service::delete_order(state.backend().orders(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    /// Only entries created strictly after this instant.
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub success: bool,
    pub notifications: Vec<AdminNotification>,
    pub unread_count: u64,
}

#[derive(Debug, Serialize)]
pub struct MarkedResponse {
    pub success: bool,
    pub updated: u64,
}

/// GET /admin/api/notifications
pub async fn notifications<B: Backend>(
    _admin: RequireAdmin,
    State(state): State<AppState<B>>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>> {
    let feed = state.backend().notifications();
    let limit = query.limit.unwrap_or(DEFAULT_FEED_SIZE).clamp(1, MAX_FEED_SIZE);
    Ok(Json(FeedResponse {
        success: true,
        notifications: feed.list(query.since, limit).await?,
        unread_count: feed.unread_count().await?,
    }))
}

/// POST /admin/api/notifications/{id}/read
pub async fn mark_notification_read<B: Backend>(
    _admin: RequireAdmin,
    State(state): State<AppState<B>>,
    Path(id): Path<NotificationId>,
) -> Result<Json<MarkedResponse>> {
    if state.backend().notifications().mark_read(id).await? {
        Ok(Json(MarkedResponse {
            success: true,
            updated: 1,
        }))
    } else {
        Err(AppError::NotFound("Notification not found".to_owned()))
    }
}

/// POST /admin/api/notifications/read-all
pub async fn mark_all_notifications_read<B: Backend>(
    _admin: RequireAdmin,
    State(state): State<AppState<B>>,
) -> Result<Json<MarkedResponse>> {
    let updated = state.backend().notifications().mark_all_read().await?;
    Ok(Json(MarkedResponse {
        success: true,
        updated,
    }))
}

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub success: bool,
    #[serde(flatten)]
    pub dashboard: Dashboard,
}

/// GET /admin/api/dashboard
pub async fn dashboard<B: Backend>(
    _admin: RequireAdmin,
    State(state): State<AppState<B>>,
) -> Result<Json<DashboardResponse>> {
    let dashboard =
        admin_service::dashboard(state.backend().orders(), state.backend().notifications())
            .await?;
    Ok(Json(DashboardResponse {
        success: true,
        dashboard,
    }))
}
