//! Listing selection state machine.
//!
//! Card data lives only inside the variant that shows it, so moving to another
//! address drops the previous target id, property and card together.

use serde::{Deserialize, Serialize};

use crate::model::{PropertyRecord, SelectionResult};
use crate::MAX_RESOLVED_CANDIDATES;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SelectionState {
    #[default]
    Idle,
    Loading {
        address: String,
    },
    MultiChoice {
        address: String,
        candidates: Vec<PropertyRecord>,
    },
    SingleConfirmPending {
        address: String,
        candidate: PropertyRecord,
        /// Everything the query returned; decides where Back leads.
        candidates: Vec<PropertyRecord>,
    },
    NotFound {
        address: String,
    },
    CustomConfirmed {
        address: String,
    },
    Confirmed {
        address: String,
        listing: PropertyRecord,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    AddressSelected(String),
    AddressEdited(String),
    CandidatesResolved {
        address: String,
        candidates: Vec<PropertyRecord>,
    },
    CandidatePicked(usize),
    Confirm,
    Back,
    UseCustomListing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEffect {
    Resolve { address: String },
    Emit(SelectionResult),
}

pub fn reduce(
    state: SelectionState,
    event: SelectionEvent,
) -> (SelectionState, Vec<SelectionEffect>) {
    use SelectionEvent as E;
    use SelectionState as S;

    match (state, event) {
        // selecting nothing clears the box
        (state, E::AddressSelected(address)) if address.trim().is_empty() => {
            reduce(state, E::AddressEdited(String::new()))
        }
        (_, E::AddressSelected(address)) => start_loading(address),

        (_, E::AddressEdited(text)) if text.trim().is_empty() => (
            S::Idle,
            vec![SelectionEffect::Emit(SelectionResult::reset())],
        ),
        (S::Confirmed { .. } | S::CustomConfirmed { .. }, E::AddressEdited(text)) => {
            start_loading(text)
        }

        (S::Loading { address }, E::CandidatesResolved { address: resolved, mut candidates })
            if address == resolved =>
        {
            candidates.truncate(MAX_RESOLVED_CANDIDATES);
            let next = match candidates.len() {
                0 => S::NotFound { address },
                1 => S::SingleConfirmPending {
                    address,
                    candidate: candidates[0].clone(),
                    candidates,
                },
                _ => S::MultiChoice {
                    address,
                    candidates,
                },
            };
            (next, Vec::new())
        }

        (S::MultiChoice { address, candidates }, E::CandidatePicked(index)) => {
            match candidates.get(index).cloned() {
                Some(candidate) => (
                    S::SingleConfirmPending {
                        address,
                        candidate,
                        candidates,
                    },
                    Vec::new(),
                ),
                None => (S::MultiChoice { address, candidates }, Vec::new()),
            }
        }

        (S::MultiChoice { address, .. } | S::NotFound { address }, E::UseCustomListing) => {
            let result = SelectionResult::custom(&address);
            (
                S::CustomConfirmed { address },
                vec![SelectionEffect::Emit(result)],
            )
        }

        (S::SingleConfirmPending { address, candidate, .. }, E::Confirm) => {
            let result = SelectionResult::matched(&address, &candidate);
            (
                S::Confirmed {
                    address,
                    listing: candidate,
                },
                vec![SelectionEffect::Emit(result)],
            )
        }
        (S::Confirmed { address, listing }, E::Confirm) => {
            let result = SelectionResult::matched(&address, &listing);
            (
                S::Confirmed { address, listing },
                vec![SelectionEffect::Emit(result)],
            )
        }

        (S::SingleConfirmPending { address, candidates, .. }, E::Back) => {
            let next = if candidates.len() > 1 {
                S::MultiChoice {
                    address,
                    candidates,
                }
            } else {
                S::NotFound { address }
            };
            (next, Vec::new())
        }

        (state, _) => (state, Vec::new()),
    }
}

fn start_loading(address: String) -> (SelectionState, Vec<SelectionEffect>) {
    (
        SelectionState::Loading {
            address: address.clone(),
        },
        vec![SelectionEffect::Resolve { address }],
    )
}

impl SelectionState {
    pub fn address(&self) -> Option<&str> {
        match self {
            SelectionState::Idle => None,
            SelectionState::Loading { address }
            | SelectionState::MultiChoice { address, .. }
            | SelectionState::SingleConfirmPending { address, .. }
            | SelectionState::NotFound { address }
            | SelectionState::CustomConfirmed { address }
            | SelectionState::Confirmed { address, .. } => Some(address),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SelectionState::Loading { .. })
    }

    pub fn target_property(&self) -> Option<&PropertyRecord> {
        match self {
            SelectionState::SingleConfirmPending { candidate, .. } => Some(candidate),
            SelectionState::Confirmed { listing, .. } => Some(listing),
            _ => None,
        }
    }

    pub fn target_id(&self) -> Option<&str> {
        self.target_property().and_then(|p| p.id.as_deref())
    }

    pub fn is_showing_target_card(&self) -> bool {
        self.target_property().is_some()
    }

    /// Confirm and Back disappear once a listing has been chosen.
    pub fn confirm_hidden(&self) -> bool {
        matches!(
            self,
            SelectionState::Confirmed { .. } | SelectionState::CustomConfirmed { .. }
        )
    }
}
