//! Checkout submission: the ORDER step payload, the outcome of one save-step
//! attempt and the start-task body sent after payment.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capabilities::{HttpResponse, HttpResult};
use crate::model::{BillingPlan, PackageSelection};
use crate::{AppError, ErrorKind};

pub const ORDER_STEP: &str = "ORDER";
pub const LISTING_ITEM: &str = "LISTING";
const SAVE_STEP_FAILED: &str = "Failed to save step";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMode {
    OneTimeCharge,
    RecurringCharge,
}

impl From<BillingPlan> for PaymentMode {
    fn from(plan: BillingPlan) -> Self {
        match plan {
            BillingPlan::OneTime => PaymentMode::OneTimeCharge,
            BillingPlan::Monthly => PaymentMode::RecurringCharge,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutStepPayload {
    pub step_name: String,
    pub data: OrderData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderData {
    pub data_list: Vec<OrderItem>,
    pub duration: u8,
    pub payment_mode: PaymentMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Listing id, or the typed address for a custom listing.
    pub data: String,
    pub package_type: String,
}

impl CheckoutStepPayload {
    pub fn order(listing_ref: &str, selection: &PackageSelection) -> Result<Self, AppError> {
        let listing_ref = listing_ref.trim();
        if listing_ref.is_empty() {
            return Err(AppError::new(
                ErrorKind::InvalidState,
                "no listing selected for checkout",
            ));
        }

        Ok(Self {
            step_name: ORDER_STEP.to_string(),
            data: OrderData {
                data_list: vec![OrderItem {
                    data: listing_ref.to_string(),
                    package_type: LISTING_ITEM.to_string(),
                }],
                duration: selection.duration_weeks(),
                payment_mode: selection.plan.into(),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SaveStepOutcome {
    Saved(Value),
    Failed(AppError),
}

impl SaveStepOutcome {
    /// Non-2xx responses count as failures even when the transport handed
    /// them back as `Ok`.
    pub fn from_result(result: HttpResult) -> Self {
        match result.and_then(HttpResponse::error_for_status) {
            Ok(response) => SaveStepOutcome::Saved(response.json().unwrap_or(Value::Null)),
            Err(e) => {
                let internal = e.to_string();
                let mut err = AppError::from(e);
                err.message = SAVE_STEP_FAILED.to_string();
                SaveStepOutcome::Failed(err.with_internal(internal))
            }
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SaveStepOutcome::Failed(e) if e.is_retryable())
    }
}

/// One checkout submission in flight. `id` goes out as the idempotency key so
/// retried attempts of the same submission are recognised by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingStep {
    pub id: String,
    pub payload: CheckoutStepPayload,
}

impl PendingStep {
    pub fn new(payload: CheckoutStepPayload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTaskBody {
    pub email: String,
}
