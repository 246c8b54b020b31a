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
    dto::{
        cart::{
            AddToCartRequest, CartView, LoadedCart, SaveCartRequest, SavedCartList,
            UpdateCartItemRequest,
        },
        orders::{
            CheckoutRequest, OrderList, OrderStats, OrderWithItems, UpdateOrderStatusRequest,
        },
        payments::{
            InitializePaymentRequest, OrderPaymentSummary, PaymentLink, PaymentList,
            PaymentStatusCheck, VerifyPaymentRequest, VerifyPaymentResult, WebhookAck,
            WebhookOutcome,
        },
    },
    error::FieldError,
    models::{CartItem, Order, OrderItem, Payment, SavedCart, SavedCartItem, StatusHistoryEntry},
    response::{ApiResponse, Meta},
    routes::{admin, cart, health, orders, params, payments},
    status::{HistoryKind, OrderPaymentStatus, OrderStatus, PaymentStatus},
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
        cart::view_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        cart::save_cart,
        cart::list_saved_carts,
        cart::get_saved_cart,
        cart::delete_saved_cart,
        cart::load_saved_cart,
        orders::list_order,
        orders::checkout,
        orders::order_stats,
        orders::get_order,
        orders::cancel_order,
        payments::initialize_payment,
        payments::verify_payment,
        payments::payment_webhook,
        payments::list_payments,
        payments::check_payment_status,
        payments::get_payment,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status
    ),
    components(
        schemas(
            CartItem,
            SavedCart,
            SavedCartItem,
            Order,
            OrderItem,
            StatusHistoryEntry,
            Payment,
            OrderStatus,
            OrderPaymentStatus,
            PaymentStatus,
            HistoryKind,
            FieldError,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartView,
            SaveCartRequest,
            SavedCartList,
            LoadedCart,
            CheckoutRequest,
            OrderStats,
            UpdateOrderStatusRequest,
            OrderList,
            OrderWithItems,
            InitializePaymentRequest,
            PaymentLink,
            VerifyPaymentRequest,
            VerifyPaymentResult,
            OrderPaymentSummary,
            PaymentList,
            PaymentStatusCheck,
            WebhookAck,
            WebhookOutcome,
            params::Pagination,
            params::OrderListQuery,
            Meta,
            ApiResponse<CartView>,
            ApiResponse<SavedCart>,
            ApiResponse<SavedCartList>,
            ApiResponse<LoadedCart>,
            ApiResponse<OrderStats>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<PaymentLink>,
            ApiResponse<VerifyPaymentResult>,
            ApiResponse<PaymentList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Payments", description = "Payment and webhook endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
