use tracing::{debug, info, instrument, warn};

use crate::address::{candidates_from_response, suggestions_from_response, visible_suggestions};
use crate::api::{Endpoints, LandingParams};
use crate::capabilities::{
    self, AnalyticsEvent, Capabilities, GatewayError, HttpError, PopupRequest, TimerPurpose,
};
use crate::checkout::{CheckoutStepPayload, PendingStep, SaveStepOutcome, StartTaskBody};
use crate::event::Event;
use crate::model::{
    CheckoutPhase, Model, PackageCard, PackageType, PropertyCard, SelectionResult, SelectionView,
    ToastView, ViewModel,
};
use crate::pricing::{self, TARGET_VIEW_OPTIONS};
use crate::promo;
use crate::selection::{self, SelectionEffect, SelectionEvent, SelectionState};
use crate::{get_current_time_ms, is_internal_api_failure, AppError, ErrorKind, ToastMessage};

/// The address-to-checkout core. `update` mutates the model and asks the
/// capabilities for side effects; it never performs them itself.
#[derive(Default)]
pub struct App;

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    #[instrument(skip_all, fields(event = event.name()))]
    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        match event {
            Event::AppStarted { page_url } => {
                model.landing = page_url
                    .as_deref()
                    .map(LandingParams::from_page_url)
                    .unwrap_or_default();
                if let Some(code) = model.landing.promo_code.clone() {
                    Self::validate_promo(model, code, caps);
                }
                caps.render.render();
            }

            Event::ConfigLoaded(config) => match config.validate() {
                Ok(()) => {
                    info!(api = %config.api_base_url, "configuration loaded");
                    model.config = config;
                }
                Err(e) => warn!(error = %e, "rejecting configuration, keeping previous"),
            },

            Event::ViewportChanged { narrow } => {
                model.narrow_viewport = narrow;
                caps.render.render();
            }

            Event::AddressTextChanged(text) => {
                model.suggest_generation += 1;
                let generation = model.suggest_generation;
                let blank = text.trim().is_empty();
                model.address_text = text.clone();

                self.apply_selection(model, SelectionEvent::AddressEdited(text), caps);
                if blank {
                    model.suggestions.clear();
                } else {
                    caps.timer.start(
                        TimerPurpose::SuggestDebounce,
                        model.config.suggest_debounce_ms,
                        Event::SuggestionTimerElapsed { generation },
                    );
                }
                caps.render.render();
            }

            Event::SuggestionTimerElapsed { generation } => {
                if generation != model.suggest_generation {
                    debug!(generation, current = model.suggest_generation, "superseded debounce timer");
                    return;
                }
                match endpoints(model).and_then(|e| e.suggest_address(&model.address_text)) {
                    Ok(url) => capabilities::send(caps.http.get(url.as_str()), &url, move |result| {
                        Event::SuggestionsFetched { generation, result }
                    }),
                    Err(e) => {
                        warn!(error = %e, "could not build suggestion request");
                        model.suggestions.clear();
                        caps.render.render();
                    }
                }
            }

            Event::SuggestionsFetched { generation, result } => {
                if generation != model.suggest_generation {
                    debug!(generation, "discarding stale suggestions");
                    return;
                }
                model.suggestions = suggestions_from_response(&result);
                caps.render.render();
            }

            Event::AddressSelected(address) => {
                // Selecting cancels any pending debounce for the typed text.
                model.suggest_generation += 1;
                model.suggestions.clear();

                if address.trim().is_empty() {
                    model.address_text.clear();
                } else {
                    model.address_text = address.clone();
                    caps.analytics.track(
                        AnalyticsEvent::new("address_selected").with("address", address.as_str()),
                    );
                }
                self.apply_selection(model, SelectionEvent::AddressSelected(address), caps);
                caps.render.render();
            }

            Event::ListingResolved {
                generation,
                address,
                endpoint,
                result,
            } => {
                if generation != model.resolve_generation {
                    debug!(generation, current = model.resolve_generation, "discarding stale resolution");
                    return;
                }
                let candidates = candidates_from_response(&result, endpoint, model.config.max_candidates);
                info!(count = candidates.len(), "listing candidates resolved");
                self.apply_selection(
                    model,
                    SelectionEvent::CandidatesResolved { address, candidates },
                    caps,
                );
                caps.render.render();
            }

            Event::CandidatePicked { index } => {
                self.selection_then_render(model, SelectionEvent::CandidatePicked(index), caps);
            }
            Event::ConfirmListing => self.selection_then_render(model, SelectionEvent::Confirm, caps),
            Event::BackPressed => self.selection_then_render(model, SelectionEvent::Back, caps),
            Event::UseCustomListing => {
                self.selection_then_render(model, SelectionEvent::UseCustomListing, caps);
            }

            Event::PackageChosen(package) => {
                model.package.package_type = package;
                caps.analytics.track(
                    AnalyticsEvent::new("package_selected")
                        .with("package", package.label())
                        .with("weeks", package.duration_weeks().to_string()),
                );
                caps.render.render();
            }

            Event::PlanChosen(plan) => {
                model.package.plan = plan;
                caps.render.render();
            }

            Event::TargetViewsChosen(views) => {
                if !TARGET_VIEW_OPTIONS.contains(&views) {
                    warn!(views, "ignoring unsupported target views");
                    return;
                }
                model.target_views = views;
                caps.render.render();
            }

            Event::PromoValidated { code, result } => {
                match promo::from_response(&code, &result, get_current_time_ms()) {
                    Ok(discount) => {
                        info!(code = %discount.code, rate = discount.discount_rate, "promo applied");
                        model.promo = Some(discount);
                    }
                    Err(e) => {
                        debug!(error = %e, "promo not applied");
                        model.promo = None;
                    }
                }
                caps.render.render();
            }

            Event::CheckoutRequested => Self::start_checkout(model, caps),

            Event::StepSaved {
                checkout_id,
                attempt,
                result,
            } => {
                if !Self::is_current_step(model, &checkout_id) {
                    debug!(attempt, "ignoring save-step result outside checkout");
                    return;
                }
                match SaveStepOutcome::from_result(result) {
                    SaveStepOutcome::Saved(_) => {
                        info!(attempt, "step saved");
                        model.pending_step = None;
                        model.checkout = CheckoutPhase::AwaitingPayment;
                        let package = model.package.package_type;
                        caps.popup.open(
                            PopupRequest {
                                listing_ref: model.listing_ref(),
                                package,
                                plan: model.package.plan,
                                price_usd: pricing::fixed_package(package).1.price,
                            },
                            Event::CheckoutPopupResolved,
                        );
                        caps.render.render();
                    }
                    SaveStepOutcome::Failed(err) => {
                        let retry_in = if err.is_retryable() {
                            model.config.retry_policy().next_delay_ms(attempt)
                        } else {
                            None
                        };
                        match retry_in {
                            Some(after_ms) => {
                                warn!(attempt, after_ms, error = %err, "save-step failed, retrying");
                                caps.timer.start(
                                    TimerPurpose::SaveStepRetry,
                                    after_ms,
                                    Event::SaveStepRetryDue {
                                        checkout_id,
                                        attempt: attempt + 1,
                                    },
                                );
                            }
                            None => {
                                model.pending_step = None;
                                Self::fail_checkout(model, &err, caps);
                            }
                        }
                    }
                }
            }

            Event::SaveStepRetryDue {
                checkout_id,
                attempt,
            } => {
                if !Self::is_current_step(model, &checkout_id) {
                    debug!(attempt, "dropping retry for abandoned checkout");
                    return;
                }
                Self::send_save_step(model, attempt, caps);
            }

            Event::CheckoutPopupResolved(result) => {
                if model.checkout != CheckoutPhase::AwaitingPayment {
                    debug!("ignoring popup result outside checkout");
                    return;
                }
                match result {
                    Ok(receipt) => {
                        Self::start_task(model, &receipt.email, caps);
                        caps.analytics.track(
                            AnalyticsEvent::new("purchase_completed")
                                .with("package", model.package.package_type.label())
                                .with("listing", model.listing_ref()),
                        );
                        model.checkout = CheckoutPhase::Completed { email: receipt.email };
                        caps.render.render();
                    }
                    Err(GatewayError::Dismissed) => {
                        info!("checkout popup dismissed");
                        model.checkout = CheckoutPhase::Idle;
                        caps.render.render();
                    }
                    Err(e) => {
                        let err = AppError::new(ErrorKind::Payment, "checkout popup failed")
                            .with_internal(e.to_string());
                        Self::fail_checkout(model, &err, caps);
                    }
                }
            }

            Event::TaskStarted(result) => match result {
                Ok(response) => debug!(status = response.status(), "task started"),
                Err(e) if is_internal_api_failure(&e.to_string()) => {
                    debug!(error = %e, "start-task failed");
                }
                Err(e) => warn!(error = %e, "start-task failed"),
            },

            Event::ToastDismissed => {
                model.clear_toast();
                caps.render.render();
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        let selected = model.package.package_type;
        let package_grid = PackageType::ALL
            .into_iter()
            .map(|package| {
                let (views, quote) = pricing::fixed_package(package);
                PackageCard {
                    package,
                    weeks: package.duration_weeks(),
                    views,
                    quote,
                    selected: package == selected,
                }
            })
            .collect();

        let now = get_current_time_ms();
        let rate = model.promo.as_ref().and_then(|p| p.active_rate(now));
        let base_price = pricing::fixed_package(selected).1.price;

        ViewModel {
            address_text: model.address_text.clone(),
            suggestions: visible_suggestions(
                &model.suggestions,
                model.narrow_viewport,
                model.config.narrow_suggestion_limit,
            ),
            selection: selection_view(&model.selection),
            confirm_hidden: model.selection.confirm_hidden(),
            selection_result: model.selection_result.clone(),
            package_grid,
            plan: model.package.plan,
            target_views: model.target_views,
            calculator: pricing::compute_package(model.package.duration_weeks(), model.target_views).ok(),
            sticky_cta_price: pricing::format_usd(pricing::sticky_cta_price(base_price, rate)),
            promo_code: model
                .promo
                .as_ref()
                .filter(|p| p.is_active(now))
                .map(|p| p.code.clone()),
            checkout: model.checkout.clone(),
            show_congratulations: matches!(model.checkout, CheckoutPhase::Completed { .. }),
            toast: model.toast.as_ref().map(ToastView::from),
        }
    }
}

impl App {
    fn selection_then_render(&self, model: &mut Model, event: SelectionEvent, caps: &Capabilities) {
        self.apply_selection(model, event, caps);
        caps.render.render();
    }

    /// Runs the selection reducer and carries out what it asks for.
    fn apply_selection(&self, model: &mut Model, event: SelectionEvent, caps: &Capabilities) {
        let state = std::mem::take(&mut model.selection);
        let (next, selection_effects) = selection::reduce(state, event);
        model.selection = next;

        for effect in selection_effects {
            match effect {
                SelectionEffect::Resolve { address } => self.resolve(model, address, caps),
                SelectionEffect::Emit(result) => {
                    let result = with_placeholder(result, &model.config.custom_listing_placeholder);
                    if let Some(event) = selection_analytics(&result) {
                        caps.analytics.track(event);
                    }
                    model.selection_result = Some(result);
                }
            }
        }
    }

    /// Every resolve gets a new generation, so reselecting an address always
    /// hits the network and older answers are dropped.
    fn resolve(&self, model: &mut Model, address: String, caps: &Capabilities) {
        model.resolve_generation += 1;
        let generation = model.resolve_generation;
        let endpoint = model.config.resolve_endpoint;

        match endpoints(model).and_then(|e| e.search_by_address(endpoint, &address)) {
            Ok(url) => capabilities::send(caps.http.get(url.as_str()), &url, move |result| {
                Event::ListingResolved {
                    generation,
                    address,
                    endpoint,
                    result,
                }
            }),
            Err(e) => {
                warn!(error = %e, "could not build resolve request");
                self.apply_selection(
                    model,
                    SelectionEvent::CandidatesResolved {
                        address,
                        candidates: Vec::new(),
                    },
                    caps,
                );
            }
        }
    }

    fn validate_promo(model: &Model, code: String, caps: &Capabilities) {
        match endpoints(model).and_then(|e| e.validate_promo(&code)) {
            Ok(url) => capabilities::send(caps.http.get(url.as_str()), &url, move |result| {
                Event::PromoValidated { code, result }
            }),
            Err(e) => warn!(error = %e, "could not build promo validation request"),
        }
    }

    fn start_checkout(model: &mut Model, caps: &Capabilities) {
        if model.checkout.is_in_flight() {
            debug!("checkout already in flight");
            return;
        }

        let listing_ref = model.listing_ref();
        if listing_ref.is_empty() {
            info!("checkout without a listing, returning to address search");
            caps.page.focus_address_search();
            caps.render.render();
            return;
        }

        let payload = match CheckoutStepPayload::order(&listing_ref, &model.package) {
            Ok(payload) => payload,
            Err(err) => return Self::fail_checkout(model, &err, caps),
        };

        model.clear_toast();
        model.checkout = CheckoutPhase::SavingStep;
        model.pending_step = Some(PendingStep::new(payload));
        caps.analytics.track(
            AnalyticsEvent::new("checkout_started")
                .with("package", model.package.package_type.label())
                .with("listing", listing_ref),
        );
        Self::send_save_step(model, 1, caps);
        caps.render.render();
    }

    fn send_save_step(model: &mut Model, attempt: u32, caps: &Capabilities) {
        let Some(step) = model.pending_step.clone() else {
            return;
        };

        let request = endpoints(model)
            .and_then(|e| e.save_step())
            .and_then(|url| {
                let builder = caps
                    .http
                    .post(url.as_str())
                    .header("Idempotency-Key", step.id.as_str())
                    .body_json(&step.payload)
                    .map_err(|e| HttpError::SerializationError {
                        message: e.to_string(),
                    })?;
                Ok((builder, url))
            });

        match request {
            Ok((builder, url)) => {
                debug!(attempt, "saving checkout step");
                let checkout_id = step.id;
                capabilities::send(builder, &url, move |result| Event::StepSaved {
                    checkout_id,
                    attempt,
                    result,
                });
            }
            Err(e) => {
                model.pending_step = None;
                let internal = e.to_string();
                let err = AppError::from(e).with_internal(internal);
                Self::fail_checkout(model, &err, caps);
            }
        }
    }

    fn start_task(model: &Model, email: &str, caps: &Capabilities) {
        let body = StartTaskBody {
            email: email.to_string(),
        };
        let request = endpoints(model)
            .and_then(|e| e.start_task())
            .and_then(|url| {
                let builder = caps.http.post(url.as_str()).body_json(&body).map_err(|e| {
                    HttpError::SerializationError {
                        message: e.to_string(),
                    }
                })?;
                Ok((builder, url))
            });
        match request {
            Ok((builder, url)) => capabilities::send(builder, &url, Event::TaskStarted),
            Err(e) => warn!(error = %e, "could not build start-task request"),
        }
    }

    fn is_current_step(model: &Model, checkout_id: &str) -> bool {
        model.checkout == CheckoutPhase::SavingStep
            && model
                .pending_step
                .as_ref()
                .is_some_and(|step| step.id == checkout_id)
    }

    fn fail_checkout(model: &mut Model, err: &AppError, caps: &Capabilities) {
        if err.is_internal_api_failure() {
            debug!(error = %err, "checkout failed");
        } else {
            warn!(error = %err, "checkout failed");
        }
        model.checkout = CheckoutPhase::Failed {
            message: err.user_facing_message().to_string(),
        };
        model.toast = Some(ToastMessage::for_error(err));
        caps.render.render();
    }
}

fn endpoints(model: &Model) -> Result<Endpoints, HttpError> {
    Endpoints::new(&model.config.api_base_url)
}

fn with_placeholder(result: SelectionResult, placeholder: &str) -> SelectionResult {
    match result {
        SelectionResult::Custom(mut custom) => {
            placeholder.clone_into(&mut custom.preview_picture);
            SelectionResult::Custom(custom)
        }
        matched @ SelectionResult::Matched(_) => matched,
    }
}

fn selection_analytics(result: &SelectionResult) -> Option<AnalyticsEvent> {
    match result {
        SelectionResult::Matched(m) => Some(
            AnalyticsEvent::new("listing_confirmed")
                .with("listing", m.id.as_str())
                .with("address", m.address_name.as_str()),
        ),
        SelectionResult::Custom(c) if !c.address_name.is_empty() => Some(
            AnalyticsEvent::new("custom_listing_selected").with("address", c.address_name.as_str()),
        ),
        SelectionResult::Custom(_) => None,
    }
}

fn selection_view(state: &SelectionState) -> SelectionView {
    match state {
        SelectionState::Idle => SelectionView::Idle,
        SelectionState::Loading { .. } => SelectionView::Loading,
        SelectionState::MultiChoice {
            address,
            candidates,
        } => SelectionView::MultiChoice {
            cards: candidates
                .iter()
                .map(|c| PropertyCard::from_record(c, address))
                .collect(),
        },
        SelectionState::SingleConfirmPending {
            address, candidate, ..
        } => SelectionView::ConfirmPending {
            card: PropertyCard::from_record(candidate, address),
        },
        SelectionState::NotFound { .. } => SelectionView::NotFound,
        SelectionState::CustomConfirmed { address } => SelectionView::CustomConfirmed {
            address_name: address.clone(),
        },
        SelectionState::Confirmed { address, listing } => SelectionView::Confirmed {
            card: PropertyCard::from_record(listing, address),
        },
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{Effect, PaymentReceipt, TimerOperation};
    use crate::config::AppConfig;
    use crate::model::BillingPlan;
    use assert_matches::assert_matches;
    use crux_core::testing::AppTester;
    use crux_core::Request;
    use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
    use serde_json::{json, Value};

    type Tester = AppTester<App, Effect>;

    fn http(effects: Vec<Effect>) -> Vec<Request<HttpRequest>> {
        effects.into_iter().filter_map(Effect::into_http).collect()
    }

    fn timers(effects: Vec<Effect>) -> Vec<Request<TimerOperation>> {
        effects.into_iter().filter_map(Effect::into_timer).collect()
    }

    fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
        request
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    fn body(request: &HttpRequest) -> Value {
        serde_json::from_slice(&request.body).unwrap()
    }

    /// Resolves an HTTP request and feeds the resulting events back in.
    fn respond(app: &Tester, model: &mut Model, request: &mut Request<HttpRequest>, response: HttpResult) -> Vec<Effect> {
        let update = app.resolve(request, response).unwrap();
        let mut effects = update.effects;
        for event in update.events {
            effects.extend(app.update(event, model).effects);
        }
        effects
    }

    fn ok_json(value: Value) -> HttpResult {
        HttpResult::Ok(HttpResponse::ok().json(value).build())
    }

    mod search_tests {
        use super::*;

        #[test]
        fn typing_schedules_debounce() {
            let app = Tester::default();
            let mut model = Model::default();

            let update = app.update(Event::AddressTextChanged("12 Ma".into()), &mut model);

            assert!(update.effects.iter().any(Effect::is_render));
            let timers = timers(update.effects);
            assert_eq!(timers.len(), 1);
            assert_eq!(
                timers[0].operation,
                TimerOperation {
                    purpose: TimerPurpose::SuggestDebounce,
                    after_ms: 800,
                }
            );
        }

        #[test]
        fn blank_text_clears_without_timer() {
            let app = Tester::default();
            let mut model = Model::default();
            model.suggestions = vec!["1 Elm".into()];

            let update = app.update(Event::AddressTextChanged("   ".into()), &mut model);

            assert!(model.suggestions.is_empty());
            assert!(timers(update.effects).is_empty());
        }

        #[test]
        fn only_latest_timer_fetches() {
            let app = Tester::default();
            let mut model = Model::default();
            let mut first = timers(app.update(Event::AddressTextChanged("12".into()), &mut model).effects);
            let mut second =
                timers(app.update(Event::AddressTextChanged("12 Main".into()), &mut model).effects);

            let update = app.resolve(&mut first[0], ()).unwrap();
            for event in update.events {
                assert!(http(app.update(event, &mut model).effects).is_empty());
            }

            let update = app.resolve(&mut second[0], ()).unwrap();
            assert_eq!(update.events, vec![Event::SuggestionTimerElapsed { generation: 2 }]);
            let requests = http(app.update(update.events[0].clone(), &mut model).effects);
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].operation.method, "GET");
            assert!(requests[0].operation.url.ends_with("/suggest-address?key=12+Main"));
            assert_eq!(header(&requests[0].operation, "accept"), Some("application/json"));
            assert!(header(&requests[0].operation, "x-request-id").is_some());
        }

        #[test]
        fn suggestions_arrive_through_http() {
            let app = Tester::default();
            let mut model = Model::default();
            app.update(Event::AddressTextChanged("12 Main".into()), &mut model);
            let mut requests = http(
                app.update(Event::SuggestionTimerElapsed { generation: 1 }, &mut model)
                    .effects,
            );

            respond(
                &app,
                &mut model,
                &mut requests[0],
                ok_json(json!({ "data": ["12 Main St", 7, "12 Main Ave"] })),
            );

            assert_eq!(app.view(&model).suggestions, vec!["12 Main St", "12 Main Ave"]);
        }

        #[test]
        fn narrow_view_caps_suggestions() {
            let app = Tester::default();
            let mut model = Model::default();
            model.suggestions = (0..7).map(|n| format!("{n} Elm")).collect();

            assert_eq!(app.view(&model).suggestions.len(), 7);
            app.update(Event::ViewportChanged { narrow: true }, &mut model);
            assert_eq!(app.view(&model).suggestions.len(), 5);
            assert_eq!(model.suggestions.len(), 7);
        }
    }

    mod resolve_tests {
        use super::*;

        fn confirmed(app: &Tester, model: &mut Model) {
            let mut requests = http(app.update(Event::AddressSelected("1 Elm".into()), model).effects);
            respond(
                app,
                model,
                &mut requests[0],
                ok_json(json!({ "data": [{ "id": "a1", "fullAddress": "1 Elm St", "price": 250000 }] })),
            );
            app.update(Event::ConfirmListing, model);
        }

        #[test]
        fn stale_resolution_is_dropped() {
            let app = Tester::default();
            let mut model = Model::default();
            app.update(Event::AddressSelected("1 Elm".into()), &mut model);
            app.update(Event::AddressSelected("1 Elm".into()), &mut model);
            assert_eq!(model.resolve_generation, 2);

            let update = app.update(
                Event::ListingResolved {
                    generation: 1,
                    address: "1 Elm".into(),
                    endpoint: model.config.resolve_endpoint,
                    result: Ok(crate::capabilities::HttpResponse::json_value(
                        200,
                        &json!({ "data": [{ "id": 1 }] }),
                    )),
                },
                &mut model,
            );
            assert!(update.effects.is_empty());
            assert!(model.selection.is_loading());
        }

        #[test]
        fn confirm_emits_matched_listing() {
            let app = Tester::default();
            let mut model = Model::default();

            confirmed(&app, &mut model);

            assert_matches!(
                &model.selection_result,
                Some(SelectionResult::Matched(m)) if m.id == "a1" && m.price == Some(250_000.0)
            );
            assert_eq!(model.listing_ref(), "a1");
        }

        #[test]
        fn view_after_confirm_survives_json_and_cbor() {
            let app = Tester::default();
            let mut model = Model::default();
            confirmed(&app, &mut model);
            let view = app.view(&model);
            assert_matches!(view.selection, SelectionView::Confirmed { .. });

            let json = serde_json::to_string(&view).unwrap();
            assert_eq!(serde_json::from_str::<ViewModel>(&json).unwrap(), view);

            let mut bytes = Vec::new();
            ciborium::into_writer(&view, &mut bytes).unwrap();
            assert_eq!(ciborium::from_reader::<ViewModel, _>(bytes.as_slice()).unwrap(), view);
        }

        #[test]
        fn selecting_blank_address_resets_selection() {
            let app = Tester::default();
            let mut model = Model::default();
            confirmed(&app, &mut model);

            let update = app.update(Event::AddressSelected(String::new()), &mut model);

            assert!(http(update.effects).is_empty());
            assert_eq!(model.selection, SelectionState::Idle);
            assert_eq!(model.selection_result, Some(SelectionResult::reset()));
            assert_eq!(model.address_text, "");
        }

        #[test]
        fn custom_listing_uses_configured_placeholder() {
            let app = Tester::default();
            let mut model = Model::default();
            app.update(
                Event::ConfigLoaded(AppConfig {
                    custom_listing_placeholder: "/img/pocket.png".into(),
                    ..AppConfig::default()
                }),
                &mut model,
            );
            let mut requests = http(app.update(Event::AddressSelected("9 Pocket Ln".into()), &mut model).effects);
            respond(&app, &mut model, &mut requests[0], ok_json(json!({ "data": [] })));
            app.update(Event::UseCustomListing, &mut model);

            assert_matches!(
                &model.selection_result,
                Some(SelectionResult::Custom(c)) if c.preview_picture == "/img/pocket.png"
            );
            assert_eq!(model.listing_ref(), "9 Pocket Ln");
        }

        #[test]
        fn invalid_config_is_rejected() {
            let app = Tester::default();
            let mut model = Model::default();

            app.update(
                Event::ConfigLoaded(AppConfig {
                    api_base_url: "ftp://nope".into(),
                    ..AppConfig::default()
                }),
                &mut model,
            );

            assert_eq!(model.config, AppConfig::default());
        }
    }

    mod checkout_tests {
        use super::*;

        fn ready_model() -> Model {
            let mut model = Model::default();
            model.selection_result = Some(SelectionResult::custom("9 Pocket Ln"));
            model
        }

        fn checkout_id(model: &Model) -> String {
            model.pending_step.as_ref().unwrap().id.clone()
        }

        fn server_error() -> crate::capabilities::HttpResult {
            crate::capabilities::HttpResponse::new(503, Vec::new(), "r").error_for_status()
        }

        #[test]
        fn no_listing_focuses_search() {
            let app = Tester::default();
            let mut model = Model::default();

            let update = app.update(Event::CheckoutRequested, &mut model);

            assert!(update
                .effects
                .iter()
                .any(|e| matches!(e, Effect::Page(r) if r.operation == crate::capabilities::PageOperation::FocusAddressSearch)));
            assert_eq!(model.checkout, CheckoutPhase::Idle);
        }

        #[test]
        fn asset_key_is_enough() {
            let app = Tester::default();
            let mut model = Model::default();
            app.update(
                Event::AppStarted {
                    page_url: Some("https://listingblast.com/?assetKey=abc".into()),
                },
                &mut model,
            );

            let requests = http(app.update(Event::CheckoutRequested, &mut model).effects);
            assert_eq!(requests.len(), 1);
            assert_eq!(body(&requests[0].operation)["data"]["dataList"][0]["data"], "abc");
        }

        #[test]
        fn save_step_posts_order_once() {
            let app = Tester::default();
            let mut model = ready_model();
            model.package.plan = BillingPlan::Monthly;

            let requests = http(app.update(Event::CheckoutRequested, &mut model).effects);

            assert_eq!(requests[0].operation.method, "POST");
            assert!(requests[0].operation.url.ends_with("/task/save-step"));
            assert_eq!(body(&requests[0].operation)["data"]["paymentMode"], "RECURRING_CHARGE");
            assert_eq!(
                header(&requests[0].operation, "idempotency-key"),
                Some(checkout_id(&model).as_str())
            );
            assert_eq!(model.checkout, CheckoutPhase::SavingStep);

            assert!(app.update(Event::CheckoutRequested, &mut model).effects.is_empty());
        }

        #[test]
        fn server_error_schedules_retry_with_backoff() {
            let app = Tester::default();
            let mut model = ready_model();
            app.update(Event::CheckoutRequested, &mut model);
            let id = checkout_id(&model);

            let update = app.update(
                Event::StepSaved {
                    checkout_id: id.clone(),
                    attempt: 1,
                    result: server_error(),
                },
                &mut model,
            );
            let mut timers = timers(update.effects);
            assert_eq!(
                timers[0].operation,
                TimerOperation {
                    purpose: TimerPurpose::SaveStepRetry,
                    after_ms: 1000,
                }
            );
            assert_eq!(model.checkout, CheckoutPhase::SavingStep);

            let update = app.resolve(&mut timers[0], ()).unwrap();
            assert_eq!(
                update.events,
                vec![Event::SaveStepRetryDue {
                    checkout_id: id.clone(),
                    attempt: 2,
                }]
            );
            let requests = http(app.update(update.events[0].clone(), &mut model).effects);
            assert_eq!(header(&requests[0].operation, "idempotency-key"), Some(id.as_str()));

            let update = app.update(
                Event::StepSaved {
                    checkout_id: id,
                    attempt: 2,
                    result: server_error(),
                },
                &mut model,
            );
            assert_eq!(super::timers(update.effects)[0].operation.after_ms, 2000);
        }

        #[test]
        fn last_attempt_failure_shows_toast() {
            let app = Tester::default();
            let mut model = ready_model();
            app.update(Event::CheckoutRequested, &mut model);

            let update = app.update(
                Event::StepSaved {
                    checkout_id: checkout_id(&model),
                    attempt: 3,
                    result: server_error(),
                },
                &mut model,
            );

            assert!(timers(update.effects).is_empty());
            assert_matches!(model.checkout, CheckoutPhase::Failed { .. });
            assert!(model.pending_step.is_none());
            let toast = app.view(&model).toast.unwrap();
            assert!(toast.message.contains("couldn't save your selection"));
            assert!(toast.support_hint.is_some());
        }

        #[test]
        fn configured_attempts_are_honored() {
            let app = Tester::default();
            let mut model = ready_model();
            app.update(
                Event::ConfigLoaded(AppConfig {
                    save_step_max_attempts: 1,
                    ..AppConfig::default()
                }),
                &mut model,
            );
            app.update(Event::CheckoutRequested, &mut model);

            let update = app.update(
                Event::StepSaved {
                    checkout_id: checkout_id(&model),
                    attempt: 1,
                    result: server_error(),
                },
                &mut model,
            );

            assert!(timers(update.effects).is_empty());
            assert_matches!(model.checkout, CheckoutPhase::Failed { .. });
        }

        #[test]
        fn client_error_is_not_retried() {
            let app = Tester::default();
            let mut model = ready_model();
            app.update(Event::CheckoutRequested, &mut model);

            let update = app.update(
                Event::StepSaved {
                    checkout_id: checkout_id(&model),
                    attempt: 1,
                    result: Ok(crate::capabilities::HttpResponse::new(404, Vec::new(), "r")),
                },
                &mut model,
            );

            assert!(timers(update.effects).is_empty());
            assert_matches!(model.checkout, CheckoutPhase::Failed { .. });
        }

        #[test]
        fn result_for_other_checkout_is_ignored() {
            let app = Tester::default();
            let mut model = ready_model();
            app.update(Event::CheckoutRequested, &mut model);

            let update = app.update(
                Event::StepSaved {
                    checkout_id: "someone-else".into(),
                    attempt: 1,
                    result: server_error(),
                },
                &mut model,
            );

            assert!(update.effects.is_empty());
            assert_eq!(model.checkout, CheckoutPhase::SavingStep);
        }

        #[test]
        fn saved_step_opens_popup_then_starts_task() {
            let app = Tester::default();
            let mut model = ready_model();
            model.package.package_type = PackageType::Boost;
            let mut requests = http(app.update(Event::CheckoutRequested, &mut model).effects);

            let effects = respond(
                &app,
                &mut model,
                &mut requests[0],
                HttpResult::Ok(HttpResponse::status(201).json(json!({ "id": "step-1" })).build()),
            );
            let mut popups: Vec<_> = effects.into_iter().filter_map(Effect::into_popup).collect();
            assert_eq!(popups[0].operation.price_usd, 158);
            assert_eq!(model.checkout, CheckoutPhase::AwaitingPayment);

            let update = app
                .resolve(&mut popups[0], Ok(PaymentReceipt { email: "a@b.co".into() }))
                .unwrap();
            let mut effects = Vec::new();
            for event in update.events {
                effects.extend(app.update(event, &mut model).effects);
            }
            let requests = http(effects);
            assert!(requests[0].operation.url.ends_with("/task/start"));
            assert_eq!(body(&requests[0].operation), json!({ "email": "a@b.co" }));
            assert!(app.view(&model).show_congratulations);

            // start-task failure does not undo completion
            app.update(Event::TaskStarted(server_error()), &mut model);
            assert!(app.view(&model).show_congratulations);
        }

        #[test]
        fn dismissed_popup_returns_to_idle() {
            let app = Tester::default();
            let mut model = ready_model();
            model.checkout = CheckoutPhase::AwaitingPayment;

            app.update(Event::CheckoutPopupResolved(Err(GatewayError::Dismissed)), &mut model);

            assert_eq!(model.checkout, CheckoutPhase::Idle);
            assert!(model.toast.is_none());
        }
    }

    mod pricing_view_tests {
        use super::*;
        use crate::promo::PromoDiscount;

        #[test]
        fn sticky_cta_applies_active_promo() {
            let app = Tester::default();
            let mut model = Model::default();
            assert_eq!(app.view(&model).sticky_cta_price, "79.00");

            model.promo = Some(PromoDiscount {
                code: "HALF".into(),
                discount_rate: 0.5,
                expires_at_ms: None,
            });
            let view = app.view(&model);
            assert_eq!(view.sticky_cta_price, "39.50");
            assert_eq!(view.promo_code.as_deref(), Some("HALF"));
        }

        #[test]
        fn grid_and_calculator() {
            let app = Tester::default();
            let mut model = Model::default();
            let update = app.update(Event::PackageChosen(PackageType::Mastery), &mut model);
            let tracked: Vec<_> = update.effects.into_iter().filter_map(Effect::into_analytics).collect();
            assert_eq!(tracked[0].operation.name, "package_selected");

            app.update(Event::TargetViewsChosen(8000), &mut model);
            assert!(app.update(Event::TargetViewsChosen(5000), &mut model).effects.is_empty());

            let view = app.view(&model);
            assert_eq!(view.package_grid.len(), 4);
            assert!(view.package_grid[3].selected);
            assert_eq!(view.package_grid[1].quote.leads, 18);
            assert_eq!(view.calculator.unwrap().price, 1264);
        }
    }
}
