//! Tokio host for the core.
//!
//! Effects that wait on something (timers, HTTP, the payment popup) run as
//! tasks on a `JoinSet`. Each task hands its request back with the output,
//! and the request is resolved on the core one at a time.

use std::sync::Arc;
use std::time::Duration;

use crux_core::{Core, Request};
use crux_http::protocol::{HttpRequest, HttpResult};
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, instrument};

use crate::capabilities::{
    AnalyticsSink, Capabilities, Effect, GatewayResult, HttpClient, PageOperation, PaymentGateway,
    PopupRequest, TimerOperation,
};
use crate::{App, AppConfig, Event, ViewModel};

/// The page: draws view models and moves focus.
pub trait Presenter: Send + Sync {
    fn render(&self, view: &ViewModel);
    fn focus_address_search(&self);
}

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("effect task failed: {0}")]
    Task(#[from] JoinError),
}

enum Resolution {
    Http(Request<HttpRequest>, HttpResult),
    Timer(Request<TimerOperation>),
    Popup(Request<PopupRequest>, GatewayResult),
}

pub struct Shell<C, G, A, P> {
    core: Core<Effect, App>,
    http: Arc<C>,
    gateway: Arc<G>,
    analytics: Arc<A>,
    presenter: Arc<P>,
    tasks: JoinSet<Resolution>,
}

#[cfg(feature = "native")]
pub type NativeShell<G, P> =
    Shell<crate::capabilities::ReqwestClient, G, crate::capabilities::TracingAnalytics, P>;

impl<C, G, A, P> Shell<C, G, A, P>
where
    C: HttpClient + 'static,
    G: PaymentGateway + 'static,
    A: AnalyticsSink + 'static,
    P: Presenter + 'static,
{
    pub fn new(
        config: AppConfig,
        http: Arc<C>,
        gateway: Arc<G>,
        analytics: Arc<A>,
        presenter: Arc<P>,
    ) -> Self {
        let mut shell = Self {
            core: Core::new::<Capabilities>(),
            http,
            gateway,
            analytics,
            presenter,
            tasks: JoinSet::new(),
        };
        shell.dispatch(Event::ConfigLoaded(config));
        shell
    }

    pub fn view(&self) -> ViewModel {
        self.core.view()
    }

    /// Number of effects still running.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Applies `event` and starts its effects. Must be called inside a tokio
    /// runtime.
    #[instrument(skip_all, fields(event = event.name()))]
    pub fn dispatch(&mut self, event: Event) {
        let effects = self.core.process_event(event);
        self.run_all(effects);
    }

    /// Waits for the next running effect and resolves it. Returns `false`
    /// when nothing is left to wait on.
    pub async fn step(&mut self) -> Result<bool, ShellError> {
        let Some(joined) = self.tasks.join_next().await else {
            return Ok(false);
        };
        let effects = match joined? {
            Resolution::Http(mut request, result) => self.core.resolve(&mut request, result),
            Resolution::Timer(mut request) => self.core.resolve(&mut request, ()),
            Resolution::Popup(mut request, result) => self.core.resolve(&mut request, result),
        };
        self.run_all(effects);
        Ok(true)
    }

    /// Drives effects until none are left, including ones started along the way.
    pub async fn run_until_idle(&mut self) -> Result<(), ShellError> {
        while self.step().await? {}
        Ok(())
    }

    fn run_all(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            debug!(effect = effect.name(), "running effect");
            self.run(effect);
        }
    }

    fn run(&mut self, effect: Effect) {
        match effect {
            Effect::Render(_) => self.presenter.render(&self.core.view()),
            Effect::Page(request) => match request.operation {
                PageOperation::FocusAddressSearch => self.presenter.focus_address_search(),
            },
            Effect::Analytics(request) => self.analytics.track(&request.operation),
            Effect::Timer(request) => {
                let after = Duration::from_millis(request.operation.after_ms);
                self.tasks.spawn(async move {
                    tokio::time::sleep(after).await;
                    Resolution::Timer(request)
                });
            }
            Effect::Http(request) => {
                let client = Arc::clone(&self.http);
                self.tasks.spawn(async move {
                    let result = client.execute(&request.operation).await;
                    Resolution::Http(request, result)
                });
            }
            Effect::PaymentPopup(request) => {
                let gateway = Arc::clone(&self.gateway);
                self.tasks.spawn(async move {
                    let result = gateway.checkout_popup(&request.operation).await;
                    Resolution::Popup(request, result)
                });
            }
        }
    }
}
