//! Package pricing.
//!
//! Two calculations share the base price table: the dropdown calculator
//! (duration x target views) and the fixed four-card grid, which always
//! prices a package at its duration's base price.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::PackageType;

/// Whole-dollar base price per duration in weeks (index 0 = 1 week).
pub const BASE_PRICES_USD: [u32; 4] = [79, 158, 237, 316];
pub const VIEWS_PER_UNIT: u32 = 2000;
pub const TARGET_VIEW_OPTIONS: [u32; 4] = [2000, 4000, 6000, 8000];
pub const DEFAULT_TARGET_VIEWS: u32 = 2000;
/// The crossed-out "was" price is the real price marked up by 14%.
pub const DISPLAY_MARKUP_PERCENT: u32 = 114;
pub const COST_PER_LEAD_USD: u32 = 9;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageQuote {
    pub name: String,
    pub price: u32,
    pub discount_price: u32,
    pub leads: u32,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("unsupported package duration: {0} weeks")]
    UnsupportedDuration(u8),

    #[error("unsupported target views: {0}")]
    UnsupportedViews(u32),
}

pub fn base_price(duration_weeks: u8) -> Result<u32, PricingError> {
    PackageType::from_weeks(duration_weeks)
        .map(|_| BASE_PRICES_USD[usize::from(duration_weeks) - 1])
        .ok_or(PricingError::UnsupportedDuration(duration_weeks))
}

pub fn package_name(package: PackageType) -> String {
    format!("{} Pack", package.label())
}

/// Dropdown calculator: price scales with `target_views / 2000`.
pub fn compute_package(duration_weeks: u8, target_views: u32) -> Result<PackageQuote, PricingError> {
    let package = PackageType::from_weeks(duration_weeks)
        .ok_or(PricingError::UnsupportedDuration(duration_weeks))?;
    if !TARGET_VIEW_OPTIONS.contains(&target_views) {
        return Err(PricingError::UnsupportedViews(target_views));
    }

    let multiplier = target_views / VIEWS_PER_UNIT;
    let price = base_price(duration_weeks)? * multiplier;
    Ok(quote(package, price))
}

/// Grid card for a package: base price, advertised at `2000 * weeks` views.
pub fn fixed_package(package: PackageType) -> (u32, PackageQuote) {
    let weeks = package.duration_weeks();
    let price = BASE_PRICES_USD[usize::from(weeks) - 1];
    (VIEWS_PER_UNIT * u32::from(weeks), quote(package, price))
}

fn quote(package: PackageType, price: u32) -> PackageQuote {
    PackageQuote {
        name: package_name(package),
        price,
        discount_price: display_markup(price),
        leads: estimated_leads(price),
    }
}

/// `round(price * 1.14)` in integer arithmetic.
pub fn display_markup(price: u32) -> u32 {
    (price * DISPLAY_MARKUP_PERCENT + 50) / 100
}

pub fn estimated_leads(price: u32) -> u32 {
    price.div_ceil(COST_PER_LEAD_USD)
}

/// Sticky call-to-action price. An active promotion takes `discount_rate`
/// (clamped to 0..=1) off the base price.
pub fn sticky_cta_price(base_price: u32, discount_rate: Option<f64>) -> f64 {
    let base = f64::from(base_price);
    match discount_rate {
        Some(rate) if rate.is_finite() => base * (1.0 - rate.clamp(0.0, 1.0)),
        _ => base,
    }
}

pub fn format_usd(amount: f64) -> String {
    format!("{amount:.2}")
}
