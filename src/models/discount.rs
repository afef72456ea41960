use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Newsletter codes give a fixed percentage off the subtotal.
pub const DISCOUNT_PERCENTAGE: u32 = 10;
pub const CODE_PREFIX: &str = "GE-";
pub const MAX_CODE_LEN: usize = 20;
const CODE_BODY_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Key of the single document holding every issued code.
pub const DISCOUNT_BOOK_KEY: &str = "newsletter-codes";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCode {
    pub code: String,
    pub email: String,
    pub used: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlreadyUsed;

impl DiscountCode {
    pub fn issue(code: String, email: String, at: DateTime<Utc>) -> Self {
        Self {
            code,
            email,
            used: false,
            created_at: at,
            used_at: None,
            order_number: None,
        }
    }

    /// One-way transition; a used code keeps its original redemption data.
    pub fn mark_used(&mut self, order_number: &str, at: DateTime<Utc>) -> Result<(), AlreadyUsed> {
        if self.used {
            return Err(AlreadyUsed);
        }
        self.used = true;
        self.used_at = Some(at);
        self.order_number = Some(order_number.to_string());
        Ok(())
    }
}

/// All issued codes keyed by normalized code.
pub type DiscountBook = BTreeMap<String, DiscountCode>;

pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    let body: String = (0..CODE_BODY_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    format!("{}{}", CODE_PREFIX, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_match_format() {
        let pattern = regex::Regex::new(r"^GE-[A-Z0-9]{6}$").unwrap();
        for _ in 0..50 {
            let code = generate_code();
            assert!(pattern.is_match(&code), "{}", code);
            assert!(code.len() <= MAX_CODE_LEN);
        }
    }

    #[test]
    fn normalization_trims_and_uppercases() {
        assert_eq!(normalize_code("  ge-abc123 "), "GE-ABC123");
    }

    #[test]
    fn used_flag_never_resets() {
        let now = Utc::now();
        let mut code = DiscountCode::issue("GE-ABC123".into(), "a@b.nl".into(), now);
        assert!(code.mark_used("GE-ORDER1", now).is_ok());
        assert_eq!(code.mark_used("GE-ORDER2", now), Err(AlreadyUsed));
        assert!(code.used);
        assert_eq!(code.order_number.as_deref(), Some("GE-ORDER1"));
    }
}
