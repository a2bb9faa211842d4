use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{AdminOrderList, OrderDetail, OrderItemDetail, OrderWithUser, ProductWithVariants},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        payments::{Column as PaymentCol, Entity as Payments, Model as PaymentModel},
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
        shipping_addresses::{Column as AddressCol, Entity as ShippingAddresses},
        users::{Entity as Users, Model as UserModel},
        variants::{Entity as Variants, Model as VariantModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, Payment, Product, User, Variant},
    response::{ApiResponse, Meta},
    routes::admin::UpdateOrderStatusRequest,
    routes::params::{OrderListQuery, SortOrder},
    services::checkout_service::{
        address_from_entity, order_from_entity, order_item_from_entity, stored_status,
    },
    state::AppState,
    status::OrderStatus,
};

/// All orders with their owning user, newest-first. Operator dashboard view.
pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<AdminOrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let status = OrderStatus::parse(status)
            .ok_or_else(|| AppError::InvalidStatus(status.clone()))?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let total = Orders::find()
        .filter(condition.clone())
        .count(&state.orm)
        .await? as i64;

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Orders::find().filter(condition).find_also_related(Users);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    for (order, user) in rows {
        items.push(OrderWithUser {
            order: order_from_entity(order)?,
            user: user.map(user_from_entity),
        });
    }

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        AdminOrderList { items },
        Some(meta),
    ))
}

/// Full order projection for the operator detail view: owning user,
/// shipping address, payments, and every line item with a snapshot of its
/// product and that product's variants.
pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderDetail>> {
    ensure_admin(user)?;

    let order = Orders::find_by_id(id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::OrderNotFound),
    };

    let owner = Users::find_by_id(order.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("order {} has no owning user", order.id))
        })?;

    let address = ShippingAddresses::find()
        .filter(AddressCol::OrderId.eq(order.id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("order {} has no shipping address", order.id))
        })?;

    let payments = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(payment_from_entity)
        .collect();

    let item_models = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?;

    let product_ids: Vec<Uuid> = item_models.iter().map(|item| item.product_id).collect();
    let products = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .find_with_related(Variants)
        .all(&state.orm)
        .await?;

    let items = item_models
        .into_iter()
        .map(|model| {
            let product = products
                .iter()
                .find(|(p, _)| p.id == model.product_id)
                .map(|(p, variants)| ProductWithVariants {
                    product: product_from_entity(p.clone()),
                    variants: variants.iter().cloned().map(variant_from_entity).collect(),
                });
            OrderItemDetail {
                item: order_item_from_entity(model),
                product,
            }
        })
        .collect();

    let data = OrderDetail {
        order: order_from_entity(order)?,
        user: user_from_entity(owner),
        shipping_address: address_from_entity(address),
        payments,
        items,
    };
    Ok(ApiResponse::success(
        "Order found",
        data,
        Some(Meta::empty()),
    ))
}

/// Operator-driven fulfillment transition. Legality is checked against the
/// status transition table on every call, never left to the calling UI.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let next = OrderStatus::parse(&payload.status)
        .ok_or_else(|| AppError::InvalidStatus(payload.status.clone()))?;

    let existing = Orders::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::OrderNotFound),
    };

    let current = stored_status(&existing)?;
    if !current.can_transition_to(next) {
        return Err(AppError::IllegalTransition {
            from: current,
            to: next,
        });
    }

    let mut active: OrderActive = existing.into();
    active.status = Set(next.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status.clone() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order)?,
        Some(Meta::empty()),
    ))
}

fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        name: model.name,
        email: model.email,
        role: model.role,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        slug: model.slug,
        description: model.description,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn variant_from_entity(model: VariantModel) -> Variant {
    Variant {
        id: model.id,
        product_id: model.product_id,
        price: model.price,
        stock_quantity: model.stock_quantity,
        storage: model.storage,
        condition: model.condition,
        color: model.color,
        ram: model.ram,
        warranty_months: model.warranty_months,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn payment_from_entity(model: PaymentModel) -> Payment {
    Payment {
        id: model.id,
        order_id: model.order_id,
        payment_method: model.payment_method,
        payment_status: model.payment_status,
        payment_reference: model.payment_reference,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
    }
}
