use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::checkout::{CheckoutItem, CheckoutRequest, PaymentMethod, ShippingAddressInput, ShippingMethod},
    dto::orders::{
        AdminOrderList, ConfirmPaymentRequest, OrderDetail, OrderItemDetail, OrderList,
        OrderWithItems, OrderWithUser, ProductWithVariants,
    },
    models::{Order, OrderItem, Payment, Product, ShippingAddress, User, Variant},
    response::{ApiResponse, Meta},
    routes::{admin, health, orders, params},
    status::{OrderStatus, PaymentStatus},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        orders::list_orders,
        orders::checkout,
        orders::confirm_payment,
        orders::get_order,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status
    ),
    components(
        schemas(
            User,
            Product,
            Variant,
            Order,
            OrderItem,
            ShippingAddress,
            Payment,
            OrderStatus,
            PaymentStatus,
            CheckoutItem,
            CheckoutRequest,
            ShippingAddressInput,
            ShippingMethod,
            PaymentMethod,
            ConfirmPaymentRequest,
            admin::UpdateOrderStatusRequest,
            OrderList,
            OrderWithItems,
            OrderWithUser,
            AdminOrderList,
            OrderItemDetail,
            ProductWithVariants,
            OrderDetail,
            params::Pagination,
            params::OrderListQuery,
            Meta,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<AdminOrderList>,
            ApiResponse<OrderDetail>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Orders", description = "Checkout and order endpoints"),
        (name = "Admin", description = "Order fulfillment endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
