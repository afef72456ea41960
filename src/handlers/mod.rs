pub mod common;
pub mod discounts;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod outbox_admin;
pub mod payments;
pub mod reviews;
pub mod shipments;
pub mod stock;
pub mod wishlists;

use std::sync::Arc;

use crate::notifications::NotificationService;
use crate::services::{
    checkout::CheckoutService, discounts::DiscountService, factory::ServiceFactory,
    orders::OrderService, reconciliation::ReconciliationService, reviews::ReviewService,
    shipments::ShipmentService, stock::StockService, wishlists::WishlistService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub discounts: Arc<DiscountService>,
    pub stock: Arc<StockService>,
    pub shipments: Arc<ShipmentService>,
    pub reviews: Arc<ReviewService>,
    pub wishlists: Arc<WishlistService>,
    pub notifications: Arc<NotificationService>,
}

impl AppServices {
    pub fn new(factory: &ServiceFactory) -> Self {
        Self {
            checkout: Arc::new(factory.checkout_service()),
            orders: Arc::new(factory.order_service()),
            reconciliation: Arc::new(factory.reconciliation_service()),
            discounts: Arc::new(factory.discount_service()),
            stock: Arc::new(factory.stock_service()),
            shipments: Arc::new(factory.shipment_service()),
            reviews: Arc::new(factory.review_service()),
            wishlists: Arc::new(factory.wishlist_service()),
            notifications: factory.notifications().clone(),
        }
    }
}
