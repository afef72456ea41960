use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::order::{check_total, generate_order_number, subtotal_of};
use crate::models::OrderItem;
use crate::services::payments::{
    is_valid_payment_id, Amount, NewPayment, PaymentGateway, PaymentMetadata, PaymentStatus,
};
use crate::validation::CreatePaymentRequest;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub payment_id: String,
    pub checkout_url: Option<String>,
    pub order_number: String,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusView {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub paid: bool,
    #[schema(value_type = Option<f64>)]
    pub amount: Option<Decimal>,
    pub order_number: Option<String>,
}

/// Creates gateway payments for checkout and reports their status.
#[derive(Clone)]
pub struct CheckoutService {
    gateway: Arc<dyn PaymentGateway>,
    config: Arc<AppConfig>,
}

impl CheckoutService {
    pub fn new(gateway: Arc<dyn PaymentGateway>, config: Arc<AppConfig>) -> Self {
        Self { gateway, config }
    }

    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        let items: Vec<OrderItem> = request
            .items
            .iter()
            .map(|item| OrderItem {
                name: item.name.clone(),
                sku: item.sku.clone(),
                quantity: item.quantity,
                price: item.price,
            })
            .collect();
        let subtotal = subtotal_of(&items);
        check_total(subtotal, request.shipping, request.discount, request.total)
            .map_err(|message| ServiceError::ValidationFailed(vec![format!("total: {}", message)]))?;

        let order_number = generate_order_number(Utc::now());
        let customer = &request.customer;
        let metadata = PaymentMetadata {
            order_number: Some(order_number.clone()),
            customer_name: Some(customer.full_name()),
            customer_email: Some(customer.email.trim().to_string()),
            street: Some(customer.straat.trim().to_string()),
            house_number: Some(customer.huisnummer.trim().to_string()),
            postcode: Some(customer.postcode.trim().to_uppercase()),
            city: Some(customer.plaats.trim().to_string()),
            comments: customer
                .opmerkingen
                .clone()
                .filter(|c| !c.trim().is_empty()),
            items,
            shipping: request.shipping,
            discount: request.discount,
            discount_code: request
                .discount_code
                .as_deref()
                .map(crate::models::discount::normalize_code)
                .filter(|c| !c.is_empty()),
            payment_method: customer.betaalmethode.map(|m| m.to_string()),
        };

        let webhook_url = self
            .config
            .webhook_reachable()
            .then(|| self.config.payment_webhook_url());
        let payment = self
            .gateway
            .create_payment(NewPayment {
                amount: Amount::eur(request.total),
                description: format!("Gameshop Enter bestelling {}", order_number),
                redirect_url: self.config.payment_redirect_url(&order_number),
                webhook_url,
                metadata: metadata.to_value(),
            })
            .await?;

        crate::metrics::record_payment_created();
        info!(%order_number, payment_id = %payment.id, "checkout payment created");
        Ok(CheckoutSession {
            payment_id: payment.id,
            checkout_url: payment.checkout_url,
            order_number,
            status: payment.status,
        })
    }

    #[instrument(skip(self))]
    pub async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatusView, ServiceError> {
        if !is_valid_payment_id(payment_id) {
            return Err(ServiceError::ValidationError(
                "Ongeldig betalings-ID".to_string(),
            ));
        }
        let payment = self.gateway.get_payment(payment_id).await.map_err(|err| match err {
            crate::services::payments::GatewayError::NotFound(id) => {
                ServiceError::NotFound(format!("Betaling {} niet gevonden", id))
            }
            other => ServiceError::PaymentProviderError(other),
        })?;
        let metadata = PaymentMetadata::from_value(&payment.metadata);

        Ok(PaymentStatusView {
            paid: payment.status.is_paid(),
            amount: payment.amount.to_decimal(),
            payment_id: payment.id,
            status: payment.status,
            order_number: metadata.order_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::payments::{GatewayError, Payment};
    use crate::validation::{CheckoutCustomer, CheckoutItem, PaymentMethod};
    use async_trait::async_trait;
    use mockall::mock;
    use rust_decimal_macros::dec;
    use serde_json::json;

    mock! {
        Gateway {}
        #[async_trait]
        impl PaymentGateway for Gateway {
            async fn create_payment(&self, payment: NewPayment) -> Result<Payment, GatewayError>;
            async fn get_payment(&self, payment_id: &str) -> Result<Payment, GatewayError>;
        }
    }

    fn request(total: Decimal) -> CreatePaymentRequest {
        CreatePaymentRequest {
            items: vec![CheckoutItem {
                name: "Zelda: Link's Awakening".into(),
                sku: "GB-020".into(),
                quantity: 1,
                price: dec!(40),
            }],
            customer: CheckoutCustomer {
                voornaam: "Jan".into(),
                achternaam: "de Vries".into(),
                email: "jan@example.nl".into(),
                straat: "Dorpsstraat".into(),
                huisnummer: "12".into(),
                postcode: "1234ab".into(),
                plaats: "Enter".into(),
                betaalmethode: Some(PaymentMethod::Ideal),
                opmerkingen: None,
            },
            shipping: dec!(4.95),
            discount: dec!(4),
            discount_code: Some("ge-abc123".into()),
            total,
        }
    }

    fn service(gateway: MockGateway, public_base_url: &str) -> CheckoutService {
        let mut config = AppConfig::with_admin_token("a-long-enough-admin-token");
        config.public_base_url = public_base_url.into();
        CheckoutService::new(Arc::new(gateway), Arc::new(config))
    }

    #[tokio::test]
    async fn payment_carries_metadata_and_webhook() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_create_payment()
            .withf(|p| {
                p.amount.value == "40.95"
                    && p.webhook_url.as_deref()
                        == Some("https://gameshopenter.nl/api/v1/payments/webhook")
                    && p.metadata["discountCode"] == json!("GE-ABC123")
                    && p.metadata["items"].is_string()
            })
            .times(1)
            .returning(|p| {
                Ok(Payment {
                    id: "tr_new".into(),
                    status: PaymentStatus::Open,
                    amount: p.amount,
                    description: p.description,
                    metadata: p.metadata,
                    checkout_url: Some("https://pay.test/tr_new".into()),
                })
            });

        let session = service(gateway, "https://gameshopenter.nl")
            .create_payment(&request(dec!(40.95)))
            .await
            .unwrap();
        assert_eq!(session.payment_id, "tr_new");
        assert!(session.order_number.starts_with("GE-"));
    }

    #[tokio::test]
    async fn localhost_omits_webhook() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_create_payment()
            .withf(|p| p.webhook_url.is_none())
            .returning(|p| {
                Ok(Payment {
                    id: "tr_local".into(),
                    status: PaymentStatus::Open,
                    amount: p.amount,
                    description: p.description,
                    metadata: p.metadata,
                    checkout_url: None,
                })
            });
        let session = service(gateway, "http://localhost:3000")
            .create_payment(&request(dec!(40.95)))
            .await
            .unwrap();
        assert_eq!(session.payment_id, "tr_local");
    }

    #[tokio::test]
    async fn mismatched_total_never_reaches_gateway() {
        let mut gateway = MockGateway::new();
        gateway.expect_create_payment().never();
        let result = service(gateway, "https://gameshopenter.nl")
            .create_payment(&request(dec!(0.01)))
            .await;
        assert!(matches!(result, Err(ServiceError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn status_lookup_rejects_malformed_ids() {
        let mut gateway = MockGateway::new();
        gateway.expect_get_payment().never();
        let result = service(gateway, "https://gameshopenter.nl")
            .payment_status("../../etc")
            .await;
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
    }
}
