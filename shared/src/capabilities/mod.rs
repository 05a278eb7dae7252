//! Side effects the core asks its host to perform.
//!
//! `App::update` never touches the network, the clock or the page. It calls
//! the capabilities below; crux turns each call into an `Effect` for the
//! shell (or a foreign host through the bridge) and feeds the answer back as
//! an event.

mod analytics;
mod gateway;
mod http;
mod page;
mod timer;

use crux_core::capability::ProtoContext;
use crux_core::render::{Render, RenderOperation};
use crux_core::{bridge::ResolveSerialized, Request, WithContext};
use crux_http::protocol::HttpRequest;
use crux_http::Http;
use serde::{Deserialize, Serialize};

pub use self::analytics::{Analytics, AnalyticsEvent, AnalyticsSink, TracingAnalytics};
pub use self::gateway::{
    GatewayError, GatewayResult, PaymentGateway, PaymentPopup, PaymentReceipt, PopupRequest,
};
pub use self::http::{
    from_crux, send, HttpClient, HttpError, HttpResponse, HttpResult, RetryPolicy, ValidatedUrl,
    MAX_TIMEOUT_MS,
};
pub use self::page::{Page, PageOperation};
pub use self::timer::{Timer, TimerOperation, TimerPurpose};

#[cfg(feature = "native")]
pub use self::http::ReqwestClient;

use crate::app::App;
use crate::event::Event;

pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
    pub timer: Timer<Event>,
    pub popup: PaymentPopup<Event>,
    pub analytics: Analytics<Event>,
    pub page: Page<Event>,
}

#[derive(Debug)]
pub enum Effect {
    Http(Request<HttpRequest>),
    Render(Request<RenderOperation>),
    Timer(Request<TimerOperation>),
    PaymentPopup(Request<PopupRequest>),
    Analytics(Request<AnalyticsEvent>),
    Page(Request<PageOperation>),
}

/// `Effect` as it crosses the bridge: the bare operation, no resolve handle.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "Effect")]
pub enum EffectFfi {
    Http(HttpRequest),
    Render(RenderOperation),
    Timer(TimerOperation),
    PaymentPopup(PopupRequest),
    Analytics(AnalyticsEvent),
    Page(PageOperation),
}

impl crux_core::Effect for Effect {
    type Ffi = EffectFfi;

    fn serialize(self) -> (EffectFfi, ResolveSerialized) {
        match self {
            Effect::Http(request) => request.serialize(EffectFfi::Http),
            Effect::Render(request) => request.serialize(EffectFfi::Render),
            Effect::Timer(request) => request.serialize(EffectFfi::Timer),
            Effect::PaymentPopup(request) => request.serialize(EffectFfi::PaymentPopup),
            Effect::Analytics(request) => request.serialize(EffectFfi::Analytics),
            Effect::Page(request) => request.serialize(EffectFfi::Page),
        }
    }
}

impl WithContext<App, Effect> for Capabilities {
    fn new_with_context(context: ProtoContext<Effect, Event>) -> Capabilities {
        Capabilities {
            http: Http::new(context.specialize(Effect::Http)),
            render: Render::new(context.specialize(Effect::Render)),
            timer: Timer::new(context.specialize(Effect::Timer)),
            popup: PaymentPopup::new(context.specialize(Effect::PaymentPopup)),
            analytics: Analytics::new(context.specialize(Effect::Analytics)),
            page: Page::new(context.specialize(Effect::Page)),
        }
    }
}

impl Effect {
    /// Short tag for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Http(_) => "http",
            Effect::Render(_) => "render",
            Effect::Timer(_) => "timer",
            Effect::PaymentPopup(_) => "payment_popup",
            Effect::Analytics(_) => "analytics",
            Effect::Page(_) => "page",
        }
    }

    pub fn is_render(&self) -> bool {
        matches!(self, Effect::Render(_))
    }

    pub fn into_http(self) -> Option<Request<HttpRequest>> {
        match self {
            Effect::Http(request) => Some(request),
            _ => None,
        }
    }

    pub fn into_timer(self) -> Option<Request<TimerOperation>> {
        match self {
            Effect::Timer(request) => Some(request),
            _ => None,
        }
    }

    pub fn into_popup(self) -> Option<Request<PopupRequest>> {
        match self {
            Effect::PaymentPopup(request) => Some(request),
            _ => None,
        }
    }

    pub fn into_analytics(self) -> Option<Request<AnalyticsEvent>> {
        match self {
            Effect::Analytics(request) => Some(request),
            _ => None,
        }
    }
}

