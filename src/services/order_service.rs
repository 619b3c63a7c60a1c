use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{OrderHistory, OrderWithItems, PlacedOrder},
    entity::{
        CartItems, Carts, Invoices, OrderItems, Orders, Products,
        cart_items::Column as CartItemCol,
        carts::{Column as CartCol, Model as CartModel},
        invoices::{ActiveModel as InvoiceActive, Column as InvoiceCol, Model as InvoiceModel},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Model as OrderModel},
        products::{Column as ProdCol, Model as ProductModel},
        sea_orm_active_enums::{InvoiceStatus, OrderStatus},
    },
    error::{AppError, AppResult, is_unique_violation},
    middleware::auth::AuthUser,
    models::{Invoice, Order, OrderItem},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Attempts at a fresh invoice number before giving up with a conflict.
pub const MAX_INVOICE_ATTEMPTS: usize = 5;

/// Eight upper-case hex characters cut from a random UUID.
pub fn generate_invoice_number() -> AppResult<String> {
    let raw = Uuid::new_v4().simple().to_string();
    Ok(raw[..8].to_uppercase())
}

pub async fn place_order(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<PlacedOrder>> {
    place_order_with(state, user, generate_invoice_number).await
}

/// Turn the caller's cart into an order, its line snapshots and a pending
/// invoice, all in one transaction. `next_invoice_number` is asked for a new
/// candidate on every attempt.
pub async fn place_order_with<F>(
    state: &AppState,
    user: &AuthUser,
    mut next_invoice_number: F,
) -> AppResult<ApiResponse<PlacedOrder>>
where
    F: FnMut() -> AppResult<String> + Send,
{
    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::EmptyCart)?;

    let txn = state.orm.begin().await?;
    let placed = match place_in_txn(&txn, user, &cart, &mut next_invoice_number).await {
        Ok(placed) => placed,
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::error!(error = %rollback_err, "order rollback failed");
            }
            return Err(err);
        }
    };
    txn.commit().await?;

    tracing::info!(
        order_id = %placed.order_id,
        invoice_number = %placed.invoice_number,
        total_amount = placed.total_amount,
        "order placed"
    );
    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_place",
        "orders",
        serde_json::json!({
            "order_id": placed.order_id,
            "invoice_number": placed.invoice_number,
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order placed successfully",
        placed,
        Some(Meta::empty()),
    ))
}

async fn place_in_txn<F>(
    txn: &DatabaseTransaction,
    user: &AuthUser,
    cart: &CartModel,
    next_invoice_number: &mut F,
) -> AppResult<PlacedOrder>
where
    F: FnMut() -> AppResult<String> + Send,
{
    let lines = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::ProductId)
        .all(txn)
        .await?;
    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }

    // Rows are locked in id order so concurrent placements never deadlock.
    let product_ids: Vec<Uuid> = lines.iter().map(|line| line.product_id).collect();
    let products: HashMap<Uuid, ProductModel> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .order_by_asc(ProdCol::Id)
        .lock(LockType::Update)
        .all(txn)
        .await?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

    let mut total_amount: i64 = 0;
    for line in &lines {
        let product = products
            .get(&line.product_id)
            .ok_or_else(|| AppError::not_found("Product"))?;
        if product.stock < line.quantity {
            return Err(AppError::InsufficientStock {
                product_id: product.id,
                requested: line.quantity,
                available: product.stock,
            });
        }
        total_amount = product
            .price
            .checked_mul(i64::from(line.quantity))
            .and_then(|subtotal| total_amount.checked_add(subtotal))
            .ok_or_else(|| AppError::Validation("Order total is too large".into()))?;
    }

    let now = Utc::now();
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        total_amount: Set(total_amount),
        status: Set(OrderStatus::Pending),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for line in &lines {
        let product = products
            .get(&line.product_id)
            .ok_or_else(|| AppError::not_found("Product"))?;

        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            quantity: Set(line.quantity),
            price: Set(product.price),
        }
        .insert(txn)
        .await?;
        items.push(item.into());

        let updated = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
            .filter(ProdCol::Id.eq(product.id))
            .filter(ProdCol::Stock.gte(line.quantity))
            .exec(txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(AppError::InsufficientStock {
                product_id: product.id,
                requested: line.quantity,
                available: product.stock,
            });
        }
    }

    let invoice = insert_invoice(txn, order.id, next_invoice_number).await?;

    // The cart row stays; only its lines go.
    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(txn)
        .await?;

    Ok(PlacedOrder {
        order_id: order.id,
        invoice_number: invoice.invoice_number,
        total_amount,
        items,
    })
}

/// Each attempt runs in its own savepoint so a duplicate number only undoes
/// that insert.
async fn insert_invoice<F>(
    txn: &DatabaseTransaction,
    order_id: Uuid,
    next_invoice_number: &mut F,
) -> AppResult<InvoiceModel>
where
    F: FnMut() -> AppResult<String> + Send,
{
    for attempt in 1..=MAX_INVOICE_ATTEMPTS {
        let invoice_number = next_invoice_number()?;
        let savepoint = txn.begin().await?;

        let inserted = InvoiceActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            invoice_number: Set(invoice_number.clone()),
            status: Set(InvoiceStatus::Pending),
            created_at: Set(Utc::now().into()),
        }
        .insert(&savepoint)
        .await;

        match inserted {
            Ok(invoice) => {
                savepoint.commit().await?;
                return Ok(invoice);
            }
            Err(err) if is_unique_violation(&err) => {
                savepoint.rollback().await?;
                tracing::warn!(attempt, %invoice_number, "invoice number already taken");
            }
            Err(err) => {
                savepoint.rollback().await?;
                return Err(err.into());
            }
        }
    }

    Err(AppError::Conflict(
        "Could not allocate a unique invoice number".into(),
    ))
}

pub async fn order_history(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderHistory>> {
    let orders = Orders::find()
        .filter(OrderCol::UserId.eq(user.user_id))
        .order_by_desc(OrderCol::CreatedAt)
        .order_by_desc(OrderCol::Id)
        .all(&state.orm)
        .await?;

    let items = with_details(&state.orm, orders).await?;
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "OK",
        OrderHistory { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    let order = with_details(&state.orm, vec![order])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Order"))?;

    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

/// Attach line snapshots and invoice to each order, keeping the input order.
pub(crate) async fn with_details<C: ConnectionTrait>(
    conn: &C,
    orders: Vec<OrderModel>,
) -> AppResult<Vec<OrderWithItems>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }
    let order_ids: Vec<Uuid> = orders.iter().map(|order| order.id).collect();

    let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(order_ids.clone()))
        .order_by_asc(OrderItemCol::ProductId)
        .all(conn)
        .await?
    {
        items_by_order
            .entry(item.order_id)
            .or_default()
            .push(item.into());
    }

    let mut invoice_by_order: HashMap<Uuid, Invoice> = Invoices::find()
        .filter(InvoiceCol::OrderId.is_in(order_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|invoice| (invoice.order_id, Invoice::from(invoice)))
        .collect();

    Ok(orders
        .into_iter()
        .map(|order| OrderWithItems {
            items: items_by_order.remove(&order.id).unwrap_or_default(),
            invoice: invoice_by_order.remove(&order.id),
            order: Order::from(order),
        })
        .collect())
}
