use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::checkout::{CheckoutItem, CheckoutRequest},
    dto::orders::{ConfirmPaymentRequest, OrderWithItems},
    entity::{
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        payments::ActiveModel as PaymentActive,
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
        shipping_addresses::{ActiveModel as AddressActive, Column as AddressCol, Entity as ShippingAddresses, Model as AddressModel},
        users::Entity as Users,
        variants::{Column as VariantCol, Entity as Variants, Model as VariantModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, ShippingAddress},
    response::{ApiResponse, Meta},
    state::AppState,
    status::{OrderStatus, PaymentStatus},
    validation::{join_field_errors, validate_shipping_address},
};

/// A cart item matched against the catalog: the variant it resolves to and
/// the price the order will carry.
struct ResolvedLine {
    product_id: Uuid,
    product_name: String,
    variant_id: Uuid,
    price: Decimal,
    quantity: i32,
    storage: String,
    condition: String,
}

/// Validate a cart against live inventory, re-price it from catalog truth,
/// and atomically persist the order aggregate plus stock decrements.
///
/// Steps 1-6 are read-only; nothing is written until every line has been
/// validated. The payload carries no prices, so there is nothing
/// client-supplied to trust or ignore.
pub async fn submit_order(
    state: &AppState,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    if payload.items.is_empty() {
        return Err(AppError::EmptyCart);
    }

    validate_shipping_address(&payload.shipping_address)
        .map_err(|errors| AppError::Validation(join_field_errors(&errors)))?;

    let user = Users::find_by_id(payload.user_id).one(&state.orm).await?;
    if user.is_none() {
        return Err(AppError::UserNotFound);
    }

    let product_ids: Vec<Uuid> = payload.items.iter().map(|item| item.product_id).collect();
    let products = Products::find()
        .filter(ProdCol::Id.is_in(product_ids.clone()))
        .find_with_related(Variants)
        .all(&state.orm)
        .await?;

    let missing: Vec<Uuid> = product_ids
        .iter()
        .filter(|id| !products.iter().any(|(p, _)| p.id == **id))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(AppError::InvalidProductReference(missing));
    }

    let lines = resolve_lines(&payload.items, &products)?;

    let total_price: Decimal = lines
        .iter()
        .map(|line| line.price * Decimal::from(line.quantity))
        .sum::<Decimal>()
        .round_dp(2);

    let txn = state.orm.begin().await?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(payload.user_id),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        total_price: Set(total_price),
        shipping_method: Set(payload.shipping_method.as_str().to_string()),
        payment_method: Set(payload.payment_method.as_str().to_string()),
        order_reference: Set(payload.order_reference.clone()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let address = AddressActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        full_name: Set(payload.shipping_address.full_name.clone()),
        address_line: Set(payload.shipping_address.address_line.clone()),
        city: Set(payload.shipping_address.city.clone()),
        state: Set(payload.shipping_address.state.clone()),
        postal_code: Set(payload.shipping_address.postal_code.clone()),
        country: Set(payload.shipping_address.country.clone()),
        email: Set(payload.shipping_address.email.clone()),
        phone_number: Set(payload.shipping_address.phone_number.clone()),
    }
    .insert(&txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::new();

    for line in &lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            price: Set(line.price),
            quantity: Set(line.quantity),
            storage: Set(line.storage.clone()),
            condition: Set(line.condition.clone()),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        order_items.push(order_item_from_entity(item));

        // Conditional decrement: the stock check above and this write are
        // separated in time, so the filter re-checks under the row lock.
        // Zero rows affected means a concurrent checkout took the stock.
        let decremented = Variants::update_many()
            .col_expr(
                VariantCol::StockQuantity,
                Expr::col(VariantCol::StockQuantity).sub(line.quantity),
            )
            .filter(VariantCol::Id.eq(line.variant_id))
            .filter(VariantCol::StockQuantity.gte(line.quantity))
            .exec(&txn)
            .await?;
        if decremented.rows_affected == 0 {
            return Err(AppError::InsufficientStock {
                product: line.product_name.clone(),
            });
        }
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(payload.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "order_reference": order.order_reference.clone(),
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    tracing::info!(order_id = %order.id, total = %total_price, "order created");

    Ok(ApiResponse::success(
        "Checkout success",
        OrderWithItems {
            order: order_from_entity(order)?,
            shipping_address: address_from_entity(address),
            items: order_items,
        },
        Some(Meta::empty()),
    ))
}

/// Manual payment confirmation: the only path from PENDING to PAID. Records
/// a payment row and advances the order inside one transaction.
pub async fn confirm_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ConfirmPaymentRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::OrderNotFound),
    };

    let current = stored_status(&order)?;
    if !current.can_transition_to(OrderStatus::Paid) {
        return Err(AppError::IllegalTransition {
            from: current,
            to: OrderStatus::Paid,
        });
    }

    let now = Utc::now();

    PaymentActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        payment_method: Set(order.payment_method.clone()),
        payment_status: Set(PaymentStatus::Paid.as_str().to_string()),
        payment_reference: Set(payload.payment_reference.clone()),
        paid_at: Set(Some(now.into())),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Paid.as_str().to_string());
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;

    let address = ShippingAddresses::find()
        .filter(AddressCol::OrderId.eq(order.id))
        .one(&txn)
        .await?
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("order {} has no shipping address", order.id))
        })?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&txn)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_confirmed",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment recorded",
        OrderWithItems {
            order: order_from_entity(order)?,
            shipping_address: address_from_entity(address),
            items,
        },
        Some(Meta::empty()),
    ))
}

fn resolve_lines(
    items: &[CheckoutItem],
    products: &[(ProductModel, Vec<VariantModel>)],
) -> AppResult<Vec<ResolvedLine>> {
    let mut lines = Vec::with_capacity(items.len());

    for item in items {
        let (product, variants) = products
            .iter()
            .find(|(p, _)| p.id == item.product_id)
            .ok_or_else(|| AppError::InvalidProductReference(vec![item.product_id]))?;

        let variant = variants
            .iter()
            .find(|v| v.storage == item.storage && v.condition == item.condition)
            .ok_or_else(|| AppError::VariantNotFound {
                product: product.name.clone(),
                storage: item.storage.clone(),
                condition: item.condition.clone(),
            })?;

        if variant.stock_quantity < item.quantity {
            return Err(AppError::InsufficientStock {
                product: product.name.clone(),
            });
        }

        lines.push(ResolvedLine {
            product_id: product.id,
            product_name: product.name.clone(),
            variant_id: variant.id,
            price: variant.price,
            quantity: item.quantity,
            storage: item.storage.clone(),
            condition: item.condition.clone(),
        });
    }

    Ok(lines)
}

pub(crate) fn stored_status(order: &OrderModel) -> AppResult<OrderStatus> {
    OrderStatus::parse(&order.status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "order {} has unknown status {}",
            order.id,
            order.status
        ))
    })
}

pub(crate) fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let status = stored_status(&model)?;
    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        status,
        total_price: model.total_price,
        shipping_method: model.shipping_method,
        payment_method: model.payment_method,
        order_reference: model.order_reference,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

pub(crate) fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        price: model.price,
        quantity: model.quantity,
        storage: model.storage,
        condition: model.condition,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn address_from_entity(model: AddressModel) -> ShippingAddress {
    ShippingAddress {
        id: model.id,
        order_id: model.order_id,
        full_name: model.full_name,
        address_line: model.address_line,
        city: model.city,
        state: model.state,
        postal_code: model.postal_code,
        country: model.country,
        email: model.email,
        phone_number: model.phone_number,
    }
}
