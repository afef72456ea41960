use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::models::discount::{
    generate_code, normalize_code, DISCOUNT_BOOK_KEY, DISCOUNT_PERCENTAGE,
};
use crate::models::{DiscountBook, DiscountCode};
use crate::store::{get_doc, update_doc, Bucket, DocumentStore};

/// Result of checking a code at checkout. Codes are not consumed here.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCheck {
    pub valid: bool,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percentage: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<f64>)]
    pub discount_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DiscountCheck {
    fn rejected(message: &str) -> Self {
        Self {
            valid: false,
            success: false,
            message: message.to_string(),
            code: None,
            discount_percentage: None,
            discount_amount: None,
            description: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemOutcome {
    Redeemed,
    AlreadyUsed,
    NotFound,
}

impl RedeemOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            RedeemOutcome::Redeemed => "Kortingscode ingewisseld",
            RedeemOutcome::AlreadyUsed => "Deze code is al gebruikt",
            RedeemOutcome::NotFound => "Code niet gevonden",
        }
    }
}

pub fn discount_amount(subtotal: Decimal) -> Decimal {
    (subtotal * Decimal::from(DISCOUNT_PERCENTAGE) / Decimal::from(100)).round_dp(2)
}

#[derive(Clone)]
pub struct DiscountService {
    store: Arc<dyn DocumentStore>,
}

impl DiscountService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn book(&self) -> Result<DiscountBook, ServiceError> {
        Ok(get_doc::<DiscountBook>(self.store.as_ref(), Bucket::Discounts, DISCOUNT_BOOK_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Issues a newsletter code for `email`, or returns the unused one it
    /// already has. The flag tells whether a new code was minted.
    #[instrument(skip(self))]
    pub async fn issue_for(&self, email: &str) -> Result<(DiscountCode, bool), ServiceError> {
        let email = email.trim().to_lowercase();
        let result = update_doc::<DiscountBook, _, ServiceError, _>(
            self.store.as_ref(),
            Bucket::Discounts,
            DISCOUNT_BOOK_KEY,
            |book| {
                if let Some(existing) = book
                    .values()
                    .find(|c| !c.used && c.email.eq_ignore_ascii_case(&email))
                {
                    return Ok((existing.clone(), false));
                }
                let mut code = generate_code();
                while book.contains_key(&code) {
                    code = generate_code();
                }
                let entry = DiscountCode::issue(code.clone(), email.clone(), Utc::now());
                book.insert(code, entry.clone());
                Ok((entry, true))
            },
        )
        .await?;

        if result.1 {
            info!(code = %result.0.code, "discount code issued");
        }
        Ok(result)
    }

    #[instrument(skip(self))]
    pub async fn validate(
        &self,
        raw_code: &str,
        subtotal: Option<Decimal>,
    ) -> Result<DiscountCheck, ServiceError> {
        let code = normalize_code(raw_code);
        if code.is_empty() {
            return Ok(DiscountCheck::rejected("Geen geldige code opgegeven"));
        }

        let book = self.book().await?;
        let Some(entry) = book.get(&code) else {
            return Ok(DiscountCheck::rejected("Ongeldige kortingscode"));
        };
        if entry.used {
            return Ok(DiscountCheck::rejected("Deze code is al gebruikt"));
        }

        Ok(DiscountCheck {
            valid: true,
            success: true,
            message: format!("{}% korting toegepast!", DISCOUNT_PERCENTAGE),
            code: Some(code),
            discount_percentage: Some(DISCOUNT_PERCENTAGE),
            discount_amount: subtotal.map(discount_amount),
            description: Some(format!(
                "{}% nieuwsbriefkorting op je bestelling",
                DISCOUNT_PERCENTAGE
            )),
        })
    }

    /// Marks the code used for `order_number`. A code that was already used
    /// keeps its original redemption data.
    #[instrument(skip(self))]
    pub async fn redeem(
        &self,
        raw_code: &str,
        order_number: &str,
    ) -> Result<RedeemOutcome, ServiceError> {
        let code = normalize_code(raw_code);
        let outcome = update_doc::<DiscountBook, _, ServiceError, _>(
            self.store.as_ref(),
            Bucket::Discounts,
            DISCOUNT_BOOK_KEY,
            |book| {
                let Some(entry) = book.get_mut(&code) else {
                    return Ok(RedeemOutcome::NotFound);
                };
                Ok(match entry.mark_used(order_number, Utc::now()) {
                    Ok(()) => RedeemOutcome::Redeemed,
                    Err(_) => RedeemOutcome::AlreadyUsed,
                })
            },
        )
        .await?;

        match outcome {
            RedeemOutcome::Redeemed => {
                crate::metrics::record_discount_redemption("redeemed");
                info!(%code, order_number, "discount code redeemed");
            }
            RedeemOutcome::AlreadyUsed => {
                crate::metrics::record_discount_redemption("already_used");
                warn!(%code, order_number, "discount code already used");
            }
            RedeemOutcome::NotFound => {
                crate::metrics::record_discount_redemption("not_found");
                warn!(%code, order_number, "unknown discount code");
            }
        }
        Ok(outcome)
    }
}
