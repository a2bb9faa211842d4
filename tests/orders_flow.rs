use mobitrade_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::checkout::{
        CheckoutItem, CheckoutRequest, PaymentMethod, ShippingAddressInput, ShippingMethod,
    },
    dto::orders::ConfirmPaymentRequest,
    entity::{
        products::ActiveModel as ProductActive,
        users::ActiveModel as UserActive,
        variants::{ActiveModel as VariantActive, Entity as Variants},
    },
    error::AppError,
    middleware::auth::AuthUser,
    routes::admin::UpdateOrderStatusRequest,
    routes::params::{OrderListQuery, Pagination},
    services::{admin_service, checkout_service, order_service},
    state::AppState,
    status::OrderStatus,
};
use rust_decimal_macros::dec;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use uuid::Uuid;

// Integration flow: checkout against live stock, manual payment
// confirmation, then operator-driven fulfillment transitions.
#[tokio::test]
async fn checkout_and_fulfillment_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    // Seed users
    let user_id = create_user(&state, "user", "user@example.com").await?;
    let admin_id = create_user(&state, "admin", "admin@example.com").await?;
    let auth_user = AuthUser {
        user_id,
        role: "user".into(),
    };
    let auth_admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };

    // Seed one product with two variants
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set("iPhone 13".into()),
        slug: Set("iphone-13".into()),
        description: Set(Some("Refurbished Apple iPhone 13".into())),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let variant_a = VariantActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        price: Set(dec!(199.99)),
        stock_quantity: Set(10),
        storage: Set("128GB".into()),
        condition: Set("Like New".into()),
        color: Set(Some("Midnight".into())),
        ram: Set(Some("4GB".into())),
        warranty_months: Set(Some(12)),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let variant_b = VariantActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        price: Set(dec!(249.99)),
        stock_quantity: Set(1),
        storage: Set("256GB".into()),
        condition: Set("Good".into()),
        color: Set(None),
        ram: Set(None),
        warranty_months: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    // Two units re-priced from the variant, stock 10 -> 8.
    // The request shape carries no price anywhere.
    let checkout_resp = checkout_service::submit_order(
        &state,
        checkout_request(user_id, vec![item(product.id, 2, "128GB", "Like New")]),
    )
    .await?;
    let created = checkout_resp.data.unwrap();
    assert_eq!(created.order.total_price, dec!(399.98));
    assert_eq!(created.order.status, OrderStatus::Pending);
    assert_eq!(created.items.len(), 1);
    assert_eq!(created.items[0].quantity, 2);
    assert_eq!(created.items[0].price, dec!(199.99));
    assert_eq!(created.shipping_address.city, "New York");
    assert_eq!(stock_of(&state, variant_a.id).await?, 8);
    let order_a = created.order;

    // Empty cart is rejected before anything is written.
    let err = checkout_service::submit_order(&state, checkout_request(user_id, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::EmptyCart));

    // Unknown user.
    let err = checkout_service::submit_order(
        &state,
        checkout_request(Uuid::new_v4(), vec![item(product.id, 1, "128GB", "Like New")]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::UserNotFound));

    // Unknown product id is named in the error.
    let ghost = Uuid::new_v4();
    let err = checkout_service::submit_order(
        &state,
        checkout_request(user_id, vec![item(ghost, 1, "128GB", "Like New")]),
    )
    .await
    .unwrap_err();
    match &err {
        AppError::InvalidProductReference(ids) => assert_eq!(ids, &vec![ghost]),
        other => panic!("expected InvalidProductReference, got {other:?}"),
    }
    assert!(err.to_string().contains(&ghost.to_string()));

    // No variant with that storage.
    let err = checkout_service::submit_order(
        &state,
        checkout_request(user_id, vec![item(product.id, 1, "1TB", "Like New")]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::VariantNotFound { .. }));

    // Malformed shipping address fails validation before the lookup phase.
    let mut bad_address_request =
        checkout_request(user_id, vec![item(product.id, 1, "128GB", "Like New")]);
    bad_address_request.shipping_address.email = "nope".into();
    let err = checkout_service::submit_order(&state, bad_address_request)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Atomicity: the second line exceeds stock, so the first line's
    // decrement and the order row must both roll back.
    let err = checkout_service::submit_order(
        &state,
        checkout_request(
            user_id,
            vec![
                item(product.id, 2, "128GB", "Like New"),
                item(product.id, 5, "256GB", "Good"),
            ],
        ),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));
    assert_eq!(stock_of(&state, variant_a.id).await?, 8);
    assert_eq!(stock_of(&state, variant_b.id).await?, 1);

    // Drain the remaining stock, then one more unit must fail.
    let drain_resp = checkout_service::submit_order(
        &state,
        checkout_request(user_id, vec![item(product.id, 8, "128GB", "Like New")]),
    )
    .await?;
    let order_b = drain_resp.data.unwrap().order;
    assert_eq!(stock_of(&state, variant_a.id).await?, 0);

    let err = checkout_service::submit_order(
        &state,
        checkout_request(user_id, vec![item(product.id, 1, "128GB", "Like New")]),
    )
    .await
    .unwrap_err();
    match &err {
        AppError::InsufficientStock { product: name } => assert_eq!(name, "iPhone 13"),
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // Manual payment confirmation: PENDING -> PAID plus one payment row.
    let pay_resp = checkout_service::confirm_payment(
        &state,
        &auth_user,
        order_a.id,
        ConfirmPaymentRequest {
            payment_reference: Some(order_a.order_reference.clone()),
        },
    )
    .await?;
    assert_eq!(pay_resp.data.unwrap().order.status, OrderStatus::Paid);

    // Paying twice is an illegal transition.
    let err = checkout_service::confirm_payment(
        &state,
        &auth_user,
        order_a.id,
        ConfirmPaymentRequest {
            payment_reference: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        AppError::IllegalTransition {
            from: OrderStatus::Paid,
            to: OrderStatus::Paid
        }
    ));

    // A pending order rejects a direct jump to SHIPPED.
    let err = admin_service::update_order_status(
        &state,
        &auth_admin,
        order_b.id,
        UpdateOrderStatusRequest {
            status: "SHIPPED".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        AppError::IllegalTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Shipped
        }
    ));

    // Unknown status string.
    let err = admin_service::update_order_status(
        &state,
        &auth_admin,
        order_b.id,
        UpdateOrderStatusRequest {
            status: "COMPLETED".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidStatus(_)));

    // Non-admin callers are refused outright.
    let err = admin_service::update_order_status(
        &state,
        &auth_user,
        order_a.id,
        UpdateOrderStatusRequest {
            status: "APPROVED".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // PAID -> APPROVED succeeds, moving backward is rejected.
    let approved = admin_service::update_order_status(
        &state,
        &auth_admin,
        order_a.id,
        UpdateOrderStatusRequest {
            status: "APPROVED".into(),
        },
    )
    .await?;
    assert_eq!(approved.data.unwrap().status, OrderStatus::Approved);

    let err = admin_service::update_order_status(
        &state,
        &auth_admin,
        order_a.id,
        UpdateOrderStatusRequest {
            status: "PAID".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::IllegalTransition { .. }));

    // Fulfillment transitions never touch the line items.
    let detail = admin_service::get_order_admin(&state, &auth_admin, order_a.id)
        .await?
        .data
        .unwrap();
    assert_eq!(detail.order.status, OrderStatus::Approved);
    assert_eq!(detail.order.total_price, dec!(399.98));
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].item.price, dec!(199.99));
    assert_eq!(detail.items[0].item.quantity, 2);
    assert_eq!(detail.payments.len(), 1);
    assert_eq!(detail.payments[0].payment_status, "paid");
    assert!(detail.payments[0].paid_at.is_some());
    let snapshot = detail.items[0].product.as_ref().expect("product snapshot");
    assert_eq!(snapshot.product.name, "iPhone 13");
    assert_eq!(snapshot.variants.len(), 2);

    // Ship, then deliver; DELIVERED is terminal.
    admin_service::update_order_status(
        &state,
        &auth_admin,
        order_a.id,
        UpdateOrderStatusRequest {
            status: "SHIPPED".into(),
        },
    )
    .await?;
    let delivered = admin_service::update_order_status(
        &state,
        &auth_admin,
        order_a.id,
        UpdateOrderStatusRequest {
            status: "DELIVERED".into(),
        },
    )
    .await?;
    assert_eq!(delivered.data.unwrap().status, OrderStatus::Delivered);

    let err = admin_service::update_order_status(
        &state,
        &auth_admin,
        order_a.id,
        UpdateOrderStatusRequest {
            status: "SHIPPED".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::IllegalTransition { .. }));

    // User listing sees both orders newest-first; admin listing carries the
    // owning user.
    let list = order_service::list_orders(&state, &auth_user, order_query())
        .await?
        .data
        .unwrap();
    assert_eq!(list.items.len(), 2);
    assert_eq!(list.items[0].id, order_b.id);

    let admin_list = admin_service::list_all_orders(&state, &auth_admin, order_query())
        .await?
        .data
        .unwrap();
    assert_eq!(admin_list.items.len(), 2);
    assert!(
        admin_list
            .items
            .iter()
            .all(|row| row.user.as_ref().is_some_and(|u| u.id == user_id))
    );

    // Owner-scoped fetch still works after fulfillment.
    let fetched = order_service::get_order(&state, &auth_user, order_a.id)
        .await?
        .data
        .unwrap();
    assert_eq!(fetched.order.order_reference, order_a.order_reference);
    assert_eq!(fetched.shipping_address.postal_code, "10001");

    let err = order_service::get_order(&state, &auth_user, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::OrderNotFound));

    Ok(())
}

fn item(product_id: Uuid, quantity: i32, storage: &str, condition: &str) -> CheckoutItem {
    CheckoutItem {
        product_id,
        quantity,
        storage: storage.into(),
        condition: condition.into(),
    }
}

fn checkout_request(user_id: Uuid, items: Vec<CheckoutItem>) -> CheckoutRequest {
    CheckoutRequest {
        user_id,
        items,
        shipping_address: ShippingAddressInput {
            full_name: "John Doe".into(),
            address_line: "123 Main St".into(),
            city: "New York".into(),
            state: "NY".into(),
            postal_code: "10001".into(),
            country: "United States".into(),
            email: "john.doe@example.com".into(),
            phone_number: "+1 (555) 123-4567".into(),
        },
        shipping_method: ShippingMethod::Standard,
        payment_method: PaymentMethod::Bank,
        order_reference: format!("ORDER-{}", &Uuid::new_v4().simple().to_string()[..10]),
    }
}

fn order_query() -> OrderListQuery {
    OrderListQuery {
        pagination: Pagination {
            page: Some(1),
            per_page: Some(20),
        },
        status: None,
        sort_order: None,
    }
}

async fn stock_of(state: &AppState, variant_id: Uuid) -> anyhow::Result<i32> {
    let variant = Variants::find_by_id(variant_id)
        .one(&state.orm)
        .await?
        .expect("variant exists");
    Ok(variant.stock_quantity)
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE payments, shipping_addresses, order_items, orders, variants, products, audit_logs, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState { pool, orm })
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set("Test User".into()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}
