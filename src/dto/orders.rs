use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::sea_orm_active_enums::{InvoiceStatus, OrderStatus};
use crate::models::{Invoice, Order, OrderItem};

#[derive(Debug, Serialize, ToSchema)]
pub struct PlacedOrder {
    pub order_id: Uuid,
    pub invoice_number: String,
    pub total_amount: i64,
    pub items: Vec<OrderItem>,
}

/// An order as the customer was charged for it.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub invoice: Option<Invoice>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct OrderHistory {
    #[schema(value_type = Vec<OrderWithItems>)]
    pub items: Vec<OrderWithItems>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateInvoiceStatusRequest {
    pub status: InvoiceStatus,
}
