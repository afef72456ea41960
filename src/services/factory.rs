use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::{
    config::AppConfig,
    errors::ServiceError,
    notifications::NotificationService,
    services::{
        carrier::{CarrierClient, PostNlClient},
        checkout::CheckoutService,
        discounts::DiscountService,
        email::{EmailProvider, HttpEmailProvider, LogEmailProvider},
        orders::OrderService,
        payments::{MollieClient, OfflineGateway, PaymentGateway},
        reconciliation::ReconciliationService,
        reviews::ReviewService,
        shipments::ShipmentService,
        stock::StockService,
        wishlists::WishlistService,
    },
    store::DocumentStore,
};

/// Factory for creating service instances with shared dependencies
#[derive(Clone)]
pub struct ServiceFactory {
    config: Arc<AppConfig>,
    store: Arc<dyn DocumentStore>,
    gateway: Arc<dyn PaymentGateway>,
    carrier: Arc<dyn CarrierClient>,
    notifications: Arc<NotificationService>,
}

impl ServiceFactory {
    /// Creates a new service factory with the given collaborators
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn PaymentGateway>,
        carrier: Arc<dyn CarrierClient>,
        email: Arc<dyn EmailProvider>,
    ) -> Self {
        let notifications = Arc::new(NotificationService::new(
            store.clone(),
            email,
            config.email.owner_address.clone(),
        ));
        Self {
            config,
            store,
            gateway,
            carrier,
            notifications,
        }
    }

    /// Builds the real HTTP collaborators from configuration. Missing
    /// credentials select the offline gateway and log-only email delivery.
    pub fn from_config(
        config: Arc<AppConfig>,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, ServiceError> {
        let gateway: Arc<dyn PaymentGateway> = match config
            .payments
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
        {
            Some(key) => Arc::new(MollieClient::new(
                key,
                config.payments.api_url.clone(),
                Duration::from_secs(config.payments.timeout_secs),
            )?),
            None => {
                warn!("no payment API key configured; using the offline gateway");
                Arc::new(OfflineGateway)
            }
        };

        let carrier: Arc<dyn CarrierClient> = Arc::new(PostNlClient::new(config.carrier.clone())?);

        let email: Arc<dyn EmailProvider> = match config.email.api_url.as_deref() {
            Some(url) if !url.trim().is_empty() => {
                info!(api_url = url, "sending email through the HTTP provider");
                Arc::new(HttpEmailProvider::new(url, &config.email)?)
            }
            _ => {
                warn!("no email provider configured; messages are only logged");
                Arc::new(LogEmailProvider)
            }
        };

        Ok(Self::new(config, store, gateway, carrier, email))
    }

    pub fn order_service(&self) -> OrderService {
        OrderService::new(self.store.clone())
    }

    pub fn discount_service(&self) -> DiscountService {
        DiscountService::new(self.store.clone())
    }

    pub fn stock_service(&self) -> StockService {
        StockService::new(self.store.clone())
    }

    pub fn review_service(&self) -> ReviewService {
        ReviewService::new(self.store.clone())
    }

    pub fn wishlist_service(&self) -> WishlistService {
        WishlistService::new(self.store.clone())
    }

    pub fn checkout_service(&self) -> CheckoutService {
        CheckoutService::new(self.gateway.clone(), self.config.clone())
    }

    pub fn reconciliation_service(&self) -> ReconciliationService {
        ReconciliationService::new(
            self.store.clone(),
            self.gateway.clone(),
            self.order_service(),
            self.discount_service(),
            self.stock_service(),
            self.notifications.clone(),
        )
    }

    pub fn shipment_service(&self) -> ShipmentService {
        ShipmentService::new(
            self.store.clone(),
            self.carrier.clone(),
            self.order_service(),
            self.notifications.clone(),
        )
    }

    /// Gets a reference to the shared notification service
    pub fn notifications(&self) -> &Arc<NotificationService> {
        &self.notifications
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }
}
