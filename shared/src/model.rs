use serde::{Deserialize, Deserializer, Serialize};

use crate::api::LandingParams;
use crate::checkout::PendingStep;
use crate::config::AppConfig;
use crate::pricing::{PackageQuote, DEFAULT_TARGET_VIEWS};
use crate::promo::PromoDiscount;
use crate::selection::SelectionState;
use crate::{ToastKind, ToastMessage, CUSTOM_LISTING_PLACEHOLDER};

/// A listing returned by the property search. Field names vary between the
/// two search endpoints, hence the aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, alias = "address", skip_serializing_if = "Option::is_none")]
    pub full_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<f64>,
    #[serde(default, alias = "baths", skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqft: Option<f64>,
    #[serde(default, alias = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub preview_picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
}

fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// The listing choice handed to the rest of the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectionResult {
    Matched(MatchedListing),
    Custom(CustomListing),
}

/// A resolved listing. The record's id and address are promoted to required
/// fields; the rest of the record rides along when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedListing {
    pub id: String,
    pub full_address: String,
    pub address_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqft: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomListing {
    pub is_custom_listing: bool,
    pub full_address: String,
    pub address_name: String,
    pub preview_picture: String,
}

impl SelectionResult {
    pub fn matched(address_name: &str, record: &PropertyRecord) -> Self {
        let full_address = record
            .full_address
            .clone()
            .unwrap_or_else(|| address_name.to_string());
        SelectionResult::Matched(MatchedListing {
            id: record.id.clone().unwrap_or_default(),
            full_address,
            address_name: address_name.to_string(),
            price: record.price,
            bedrooms: record.bedrooms,
            bathrooms: record.bathrooms,
            sqft: record.sqft,
            preview_picture: record.preview_picture.clone(),
            agent_name: record.agent_name.clone(),
        })
    }

    pub fn custom(address_name: &str) -> Self {
        SelectionResult::Custom(CustomListing {
            is_custom_listing: true,
            full_address: String::new(),
            address_name: address_name.to_string(),
            preview_picture: CUSTOM_LISTING_PLACEHOLDER.to_string(),
        })
    }

    /// What the result looks like after the address box is cleared.
    pub fn reset() -> Self {
        Self::custom("")
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, SelectionResult::Custom(_))
    }

    /// Listing id for a matched listing, the searched text for a custom one.
    pub fn listing_ref(&self) -> &str {
        match self {
            SelectionResult::Matched(m) => &m.id,
            SelectionResult::Custom(c) => &c.address_name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    #[default]
    Starter,
    Boost,
    Growth,
    Mastery,
}

impl PackageType {
    pub const ALL: [PackageType; 4] = [
        PackageType::Starter,
        PackageType::Boost,
        PackageType::Growth,
        PackageType::Mastery,
    ];

    pub const fn duration_weeks(self) -> u8 {
        match self {
            PackageType::Starter => 1,
            PackageType::Boost => 2,
            PackageType::Growth => 3,
            PackageType::Mastery => 4,
        }
    }

    pub const fn from_weeks(weeks: u8) -> Option<Self> {
        match weeks {
            1 => Some(PackageType::Starter),
            2 => Some(PackageType::Boost),
            3 => Some(PackageType::Growth),
            4 => Some(PackageType::Mastery),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            PackageType::Starter => "Starter",
            PackageType::Boost => "Boost",
            PackageType::Growth => "Growth",
            PackageType::Mastery => "Mastery",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BillingPlan {
    #[default]
    #[serde(rename = "one-time")]
    OneTime,
    #[serde(rename = "monthly")]
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSelection {
    pub package_type: PackageType,
    pub plan: BillingPlan,
}

impl PackageSelection {
    pub fn duration_weeks(&self) -> u8 {
        self.package_type.duration_weeks()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum CheckoutPhase {
    #[default]
    Idle,
    SavingStep,
    AwaitingPayment,
    Completed {
        email: String,
    },
    Failed {
        message: String,
    },
}

impl CheckoutPhase {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, CheckoutPhase::SavingStep | CheckoutPhase::AwaitingPayment)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub config: AppConfig,

    // Address search
    pub address_text: String,
    pub suggestions: Vec<String>,
    pub suggest_generation: u64,
    pub narrow_viewport: bool,

    // Listing resolution
    pub selection: SelectionState,
    pub resolve_generation: u64,
    pub selection_result: Option<SelectionResult>,

    // Package
    pub package: PackageSelection,
    pub target_views: u32,

    // Landing page
    pub landing: LandingParams,
    pub promo: Option<PromoDiscount>,

    // Checkout
    pub checkout: CheckoutPhase,
    pub pending_step: Option<PendingStep>,

    pub toast: Option<ToastMessage>,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            address_text: String::new(),
            suggestions: Vec::new(),
            suggest_generation: 0,
            narrow_viewport: false,
            selection: SelectionState::Idle,
            resolve_generation: 0,
            selection_result: None,
            package: PackageSelection::default(),
            target_views: DEFAULT_TARGET_VIEWS,
            landing: LandingParams::default(),
            promo: None,
            checkout: CheckoutPhase::Idle,
            pending_step: None,
            toast: None,
        }
    }
}

impl Model {
    /// Listing reference for checkout: the confirmed selection first, then
    /// the `assetKey` the page was opened with. Empty when neither exists.
    pub fn listing_ref(&self) -> String {
        self.selection_result
            .as_ref()
            .map(|r| r.listing_ref().trim().to_string())
            .filter(|r| !r.is_empty())
            .or_else(|| self.landing.asset_key.clone())
            .unwrap_or_default()
    }

    pub fn clear_toast(&mut self) {
        self.toast = None;
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyCard {
    pub id: Option<String>,
    pub full_address: String,
    pub price: Option<f64>,
    pub bedrooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub sqft: Option<f64>,
    pub preview_picture: Option<String>,
    pub agent_name: Option<String>,
}

impl PropertyCard {
    pub fn from_record(record: &PropertyRecord, fallback_address: &str) -> Self {
        Self {
            id: record.id.clone(),
            full_address: record
                .full_address
                .clone()
                .unwrap_or_else(|| fallback_address.to_string()),
            price: record.price,
            bedrooms: record.bedrooms,
            bathrooms: record.bathrooms,
            sqft: record.sqft,
            preview_picture: record.preview_picture.clone(),
            agent_name: record.agent_name.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SelectionView {
    Idle,
    Loading,
    MultiChoice { cards: Vec<PropertyCard> },
    ConfirmPending { card: PropertyCard },
    NotFound,
    CustomConfirmed { address_name: String },
    Confirmed { card: PropertyCard },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageCard {
    pub package: PackageType,
    pub weeks: u8,
    pub views: u32,
    pub quote: PackageQuote,
    pub selected: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToastView {
    pub message: String,
    pub kind: ToastKind,
    pub support_hint: Option<String>,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            kind: t.kind,
            support_hint: t.support_hint.clone(),
            duration_ms: t.duration_ms,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub address_text: String,
    pub suggestions: Vec<String>,
    pub selection: SelectionView,
    pub confirm_hidden: bool,
    pub selection_result: Option<SelectionResult>,
    pub package_grid: Vec<PackageCard>,
    pub plan: BillingPlan,
    pub target_views: u32,
    pub calculator: Option<PackageQuote>,
    pub sticky_cta_price: String,
    pub promo_code: Option<String>,
    pub checkout: CheckoutPhase,
    pub show_congratulations: bool,
    pub toast: Option<ToastView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_accepts_aliases() {
        let record: PropertyRecord = serde_json::from_value(json!({
            "id": 42,
            "address": "1 Elm St",
            "price": 450000,
            "bedrooms": 3,
            "baths": 2.5,
            "sqft": 1800,
            "imageUrl": "https://img/1.jpg",
            "agentName": "Sam Lee"
        }))
        .unwrap();

        assert_eq!(record.id.as_deref(), Some("42"));
        assert_eq!(record.full_address.as_deref(), Some("1 Elm St"));
        assert_eq!(record.bathrooms, Some(2.5));
        assert_eq!(record.preview_picture.as_deref(), Some("https://img/1.jpg"));
    }

    #[test]
    fn record_tolerates_missing_fields() {
        let record: PropertyRecord = serde_json::from_value(json!({ "id": "" })).unwrap();
        assert_eq!(record, PropertyRecord::default());
    }

    #[test]
    fn custom_result_shape() {
        let value = serde_json::to_value(SelectionResult::custom("12 Oak Ave")).unwrap();
        assert_eq!(
            value,
            json!({
                "isCustomListing": true,
                "fullAddress": "",
                "addressName": "12 Oak Ave",
                "previewPicture": CUSTOM_LISTING_PLACEHOLDER,
            })
        );
    }

    fn matched() -> SelectionResult {
        let record = PropertyRecord {
            id: Some("abc".into()),
            full_address: Some("1 Elm St, Springfield".into()),
            price: Some(300_000.0),
            bathrooms: Some(2.5),
            agent_name: Some("Sam Lee".into()),
            ..PropertyRecord::default()
        };
        SelectionResult::matched("1 elm", &record)
    }

    #[test]
    fn matched_result_shape() {
        let result = matched();
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(
            value,
            json!({
                "id": "abc",
                "fullAddress": "1 Elm St, Springfield",
                "addressName": "1 elm",
                "price": 300_000.0,
                "bathrooms": 2.5,
                "agentName": "Sam Lee",
            })
        );
        assert_eq!(result.listing_ref(), "abc");
        assert!(!result.is_custom());
    }

    #[test]
    fn matched_result_survives_json() {
        let result = matched();
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(serde_json::from_str::<SelectionResult>(&json).unwrap(), result);
    }

    #[test]
    fn matched_result_survives_cbor() {
        let result = matched();
        let mut bytes = Vec::new();
        ciborium::into_writer(&result, &mut bytes).unwrap();
        let back: SelectionResult = ciborium::from_reader(bytes.as_slice()).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn custom_result_survives_json() {
        let result = SelectionResult::custom("12 Oak Ave");
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(serde_json::from_str::<SelectionResult>(&json).unwrap(), result);
    }

    #[test]
    fn package_weeks_are_one_to_one() {
        for package in PackageType::ALL {
            assert_eq!(PackageType::from_weeks(package.duration_weeks()), Some(package));
        }
        assert_eq!(PackageType::from_weeks(0), None);
        assert_eq!(PackageType::from_weeks(5), None);
    }

    #[test]
    fn listing_ref_falls_back_to_asset_key() {
        let mut model = Model::default();
        assert_eq!(model.listing_ref(), "");

        model.landing.asset_key = Some("asset-9".into());
        assert_eq!(model.listing_ref(), "asset-9");

        model.selection_result = Some(SelectionResult::reset());
        assert_eq!(model.listing_ref(), "asset-9");

        model.selection_result = Some(SelectionResult::custom("5 Pine Rd"));
        assert_eq!(model.listing_ref(), "5 Pine Rd");
    }
}
