//! Backend endpoint URLs and landing-page URL parameters.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::capabilities::{HttpError, ValidatedUrl};

/// Which property-search endpoint resolves a chosen address. Both are live:
/// v1 answers with a bare record or array, v2 wraps it in `{ data }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveEndpoint {
    V1,
    #[default]
    V2,
}

impl ResolveEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            ResolveEndpoint::V1 => "search-by-address",
            ResolveEndpoint::V2 => "search-by-address-v2",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Result<Self, HttpError> {
        let mut base = Url::parse(base_url).map_err(|e| HttpError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        // `join` replaces the last segment unless the path ends with a slash
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        ValidatedUrl::from_url(&base)?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn suggest_address(&self, key: &str) -> Result<ValidatedUrl, HttpError> {
        self.with_query("suggest-address", &[("key", key)])
    }

    pub fn search_by_address(
        &self,
        endpoint: ResolveEndpoint,
        address: &str,
    ) -> Result<ValidatedUrl, HttpError> {
        self.with_query(endpoint.path(), &[("address", address)])
    }

    pub fn save_step(&self) -> Result<ValidatedUrl, HttpError> {
        self.with_query("task/save-step", &[])
    }

    pub fn start_task(&self) -> Result<ValidatedUrl, HttpError> {
        self.with_query("task/start", &[])
    }

    pub fn validate_promo(&self, code: &str) -> Result<ValidatedUrl, HttpError> {
        self.with_query("promo-code/validate", &[("code", code)])
    }

    fn with_query(&self, path: &str, query: &[(&str, &str)]) -> Result<ValidatedUrl, HttpError> {
        let mut url = self.base.join(path).map_err(|e| HttpError::InvalidUrl {
            url: format!("{}{path}", self.base),
            reason: e.to_string(),
        })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        ValidatedUrl::from_url(&url)
    }
}

/// Parameters the landing page was opened with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandingParams {
    pub asset_key: Option<String>,
    pub promo_code: Option<String>,
}

impl LandingParams {
    /// Reads `assetKey` and `code` (or `promo`) from a page URL. Anything
    /// unparsable yields empty params.
    pub fn from_page_url(page_url: &str) -> Self {
        let Ok(url) = Url::parse(page_url) else {
            return Self::default();
        };

        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "assetKey" => params.asset_key = Some(value.to_string()),
                "code" | "promo" if params.promo_code.is_none() => {
                    params.promo_code = Some(value.to_string());
                }
                _ => {}
            }
        }
        params
    }
}
