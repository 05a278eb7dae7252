use serde::{Deserialize, Serialize};

use crate::api::ResolveEndpoint;
use crate::capabilities::{GatewayResult, HttpResult};
use crate::config::AppConfig;
use crate::model::{BillingPlan, PackageType};

/// Everything that can happen to the core: user intents from the page and
/// completions of effects the host ran on its behalf.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Page lifecycle
    AppStarted {
        page_url: Option<String>,
    },
    ConfigLoaded(AppConfig),
    ViewportChanged {
        narrow: bool,
    },

    // Address search
    AddressTextChanged(String),
    SuggestionTimerElapsed {
        generation: u64,
    },
    SuggestionsFetched {
        generation: u64,
        result: HttpResult,
    },

    // Listing resolution
    AddressSelected(String),
    ListingResolved {
        generation: u64,
        address: String,
        endpoint: ResolveEndpoint,
        result: HttpResult,
    },
    CandidatePicked {
        index: usize,
    },
    ConfirmListing,
    BackPressed,
    UseCustomListing,

    // Package
    PackageChosen(PackageType),
    PlanChosen(BillingPlan),
    TargetViewsChosen(u32),
    PromoValidated {
        code: String,
        result: HttpResult,
    },

    // Checkout
    CheckoutRequested,
    StepSaved {
        checkout_id: String,
        attempt: u32,
        result: HttpResult,
    },
    SaveStepRetryDue {
        checkout_id: String,
        attempt: u32,
    },
    CheckoutPopupResolved(GatewayResult),
    TaskStarted(HttpResult),

    ToastDismissed,
}

impl Event {
    /// Short name for log fields. Payloads may carry user input, so they are
    /// left out.
    pub fn name(&self) -> &'static str {
        match self {
            Event::AppStarted { .. } => "app_started",
            Event::ConfigLoaded(_) => "config_loaded",
            Event::ViewportChanged { .. } => "viewport_changed",
            Event::AddressTextChanged(_) => "address_text_changed",
            Event::SuggestionTimerElapsed { .. } => "suggestion_timer_elapsed",
            Event::SuggestionsFetched { .. } => "suggestions_fetched",
            Event::AddressSelected(_) => "address_selected",
            Event::ListingResolved { .. } => "listing_resolved",
            Event::CandidatePicked { .. } => "candidate_picked",
            Event::ConfirmListing => "confirm_listing",
            Event::BackPressed => "back_pressed",
            Event::UseCustomListing => "use_custom_listing",
            Event::PackageChosen(_) => "package_chosen",
            Event::PlanChosen(_) => "plan_chosen",
            Event::TargetViewsChosen(_) => "target_views_chosen",
            Event::PromoValidated { .. } => "promo_validated",
            Event::CheckoutRequested => "checkout_requested",
            Event::StepSaved { .. } => "step_saved",
            Event::SaveStepRetryDue { .. } => "save_step_retry_due",
            Event::CheckoutPopupResolved(_) => "checkout_popup_resolved",
            Event::TaskStarted(_) => "task_started",
            Event::ToastDismissed => "toast_dismissed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_round_trip_through_json() {
        let event = Event::AddressTextChanged("12 Main".into());
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(serde_json::from_str::<Event>(&json).unwrap(), event);
    }

    #[test]
    fn name_omits_payload() {
        assert_eq!(
            Event::AddressSelected("1 Secret Ln".into()).name(),
            "address_selected"
        );
    }
}
