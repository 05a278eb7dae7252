//! Promo codes from the landing URL, validated against the backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::capabilities::HttpResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoDiscount {
    pub code: String,
    /// Fraction of the price taken off, within `0.0..=1.0`.
    pub discount_rate: f64,
    pub expires_at_ms: Option<u64>,
}

impl PromoDiscount {
    pub fn is_active(&self, now_ms: u64) -> bool {
        self.discount_rate > 0.0 && !self.expires_at_ms.is_some_and(|exp| now_ms >= exp)
    }

    /// Rate for price display, if the promotion still applies.
    pub fn active_rate(&self, now_ms: u64) -> Option<f64> {
        self.is_active(now_ms).then_some(self.discount_rate)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PromoError {
    #[error("promo code '{0}' is not valid")]
    Invalid(String),

    #[error("promo code '{0}' has expired")]
    Expired(String),

    #[error("promo validation failed: {0}")]
    Unavailable(String),
}

#[derive(Deserialize)]
struct ValidateResponse {
    #[serde(default)]
    data: Option<ValidateData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateData {
    #[serde(default)]
    valid: bool,
    #[serde(default)]
    discount_rate: Option<Value>,
    #[serde(default)]
    expiration_time: Option<Value>,
}

/// Reads a `/promo-code/validate` response into a discount that is active at
/// `now_ms`.
pub fn from_response(code: &str, result: &HttpResult, now_ms: u64) -> Result<PromoDiscount, PromoError> {
    let response = result
        .as_ref()
        .map_err(|e| PromoError::Unavailable(e.to_string()))?;
    if !response.is_success() {
        return Err(PromoError::Unavailable(format!("status {}", response.status())));
    }

    let body: ValidateResponse = response
        .json()
        .map_err(|e| PromoError::Unavailable(e.to_string()))?;
    let data = body
        .data
        .filter(|d| d.valid)
        .ok_or_else(|| PromoError::Invalid(code.to_string()))?;

    let discount = PromoDiscount {
        code: code.to_string(),
        discount_rate: data
            .discount_rate
            .as_ref()
            .and_then(lenient_f64)
            .map_or(0.0, normalize_rate),
        expires_at_ms: data.expiration_time.as_ref().and_then(parse_expiration),
    };

    if discount.expires_at_ms.is_some_and(|exp| now_ms >= exp) {
        return Err(PromoError::Expired(code.to_string()));
    }
    Ok(discount)
}

/// One backend variant sends `20` for 20%, another `0.2`.
pub fn normalize_rate(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    let rate = if raw > 1.0 { raw / 100.0 } else { raw };
    rate.clamp(0.0, 1.0)
}

/// Epoch milliseconds (number or numeric string) or an RFC 3339 timestamp.
pub fn parse_expiration(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| {
                let at = OffsetDateTime::parse(s, &Rfc3339).ok()?;
                u64::try_from(at.unix_timestamp_nanos() / 1_000_000).ok()
            })
        }
        _ => None,
    }
}

fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
