//! Address lookup: suggestion lists and listing candidates.
//!
//! Both lookups are fail-soft. A transport error, an error status or a body
//! of the wrong shape all come out as an empty list, which the page shows as
//! "no suggestions" or "not found".

use serde_json::Value;
use tracing::{debug, warn};

use crate::api::ResolveEndpoint;
use crate::capabilities::HttpResult;
use crate::model::PropertyRecord;

/// Suggestion strings from a `/suggest-address` response.
pub fn suggestions_from_response(result: &HttpResult) -> Vec<String> {
    match body_json(result) {
        Some(value) => normalize_suggestions(&value),
        None => Vec::new(),
    }
}

/// `{ data: string[] }` to the list of strings. Non-string entries are dropped.
pub fn normalize_suggestions(value: &Value) -> Vec<String> {
    match value.get("data") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => {
            debug!("suggestion payload has no data array");
            Vec::new()
        }
    }
}

/// Candidate listings from a property-search response, at most `limit`.
pub fn candidates_from_response(
    result: &HttpResult,
    endpoint: ResolveEndpoint,
    limit: usize,
) -> Vec<PropertyRecord> {
    match body_json(result) {
        Some(value) => normalize_candidates(&value, endpoint, limit),
        None => Vec::new(),
    }
}

/// v1 answers with a record or an array of records, v2 with the same wrapped
/// in `{ data }`.
pub fn normalize_candidates(
    value: &Value,
    endpoint: ResolveEndpoint,
    limit: usize,
) -> Vec<PropertyRecord> {
    let payload = match endpoint {
        ResolveEndpoint::V1 => Some(value),
        ResolveEndpoint::V2 => value.get("data"),
    };

    let items: Vec<&Value> = match payload {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(map)) if !map.is_empty() => vec![item],
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter(|item| item.is_object())
        .filter_map(|item| match serde_json::from_value::<PropertyRecord>(item.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(error = %e, "skipping unreadable property record");
                None
            }
        })
        .take(limit)
        .collect()
}

/// The suggestions the page shows: the first `narrow_limit` on a narrow
/// viewport, all of them otherwise.
pub fn visible_suggestions(suggestions: &[String], narrow: bool, narrow_limit: usize) -> Vec<String> {
    let shown = if narrow {
        suggestions.len().min(narrow_limit)
    } else {
        suggestions.len()
    };
    suggestions[..shown].to_vec()
}

fn body_json(result: &HttpResult) -> Option<Value> {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            if crate::is_internal_api_failure(&e.to_string()) {
                debug!(error = %e, "address lookup failed");
            } else {
                warn!(error = %e, "address lookup failed");
            }
            return None;
        }
    };

    if !response.is_success() {
        warn!(status = response.status(), "address lookup returned error status");
        return None;
    }

    match response.json::<Value>() {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "address lookup returned malformed body");
            None
        }
    }
}
