use chrono::Utc;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{OrderList, UpdateInvoiceStatusRequest, UpdateOrderStatusRequest},
    entity::{
        Invoices, OrderItems, Orders, Products,
        invoices::{ActiveModel as InvoiceActive, Column as InvoiceCol},
        order_items::Column as OrderItemCol,
        orders::{ActiveModel as OrderActive, Column as OrderCol, Model as OrderModel},
        products::Column as ProdCol,
        sea_orm_active_enums::{InvoiceStatus, OrderStatus},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Invoice, Order},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let mut finder = Orders::find().filter(condition);

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);

    Ok(ApiResponse::success("Orders", OrderList { items: orders }, Some(meta)))
}

/// Move an order along its lifecycle. Cancelling puts every line's quantity
/// back on the shelf and fails a still-pending invoice.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;
    let order = match transition_order(&txn, id, payload.status).await {
        Ok(order) => order,
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::error!(error = %rollback_err, "order status rollback failed");
            }
            return Err(err);
        }
    };
    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "status": order.status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order updated",
        Order::from(order),
        Some(Meta::empty()),
    ))
}

async fn transition_order(
    txn: &DatabaseTransaction,
    id: Uuid,
    next: OrderStatus,
) -> AppResult<OrderModel> {
    let existing = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    if !existing.status.can_transition_to(next) {
        return Err(AppError::Validation(format!(
            "Cannot change order status from {:?} to {:?}",
            existing.status, next
        )));
    }

    if next == OrderStatus::Cancelled {
        let items = OrderItems::find()
            .filter(OrderItemCol::OrderId.eq(existing.id))
            .order_by_asc(OrderItemCol::ProductId)
            .all(txn)
            .await?;
        for item in items {
            Products::update_many()
                .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
                .filter(ProdCol::Id.eq(item.product_id))
                .exec(txn)
                .await?;
        }

        Invoices::update_many()
            .col_expr(InvoiceCol::Status, Expr::value(InvoiceStatus::Failed))
            .filter(
                Condition::all()
                    .add(InvoiceCol::OrderId.eq(existing.id))
                    .add(InvoiceCol::Status.eq(InvoiceStatus::Pending)),
            )
            .exec(txn)
            .await?;
    }

    let mut active: OrderActive = existing.into();
    active.status = Set(next);
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(txn).await?)
}

pub async fn update_invoice_status(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: UpdateInvoiceStatusRequest,
) -> AppResult<ApiResponse<Invoice>> {
    let existing = Invoices::find()
        .filter(InvoiceCol::OrderId.eq(order_id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Invoice"))?;

    if !existing.status.can_transition_to(payload.status) {
        return Err(AppError::Validation(format!(
            "Cannot change invoice status from {:?} to {:?}",
            existing.status, payload.status
        )));
    }

    let mut active: InvoiceActive = existing.into();
    active.status = Set(payload.status);
    let invoice = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "invoice_status_update",
        "invoices",
        serde_json::json!({ "order_id": order_id, "status": invoice.status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Invoice updated",
        Invoice::from(invoice),
        Some(Meta::empty()),
    ))
}
