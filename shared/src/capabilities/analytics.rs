use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub properties: BTreeMap<String, String>,
}

impl AnalyticsEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl Operation for AnalyticsEvent {
    type Output = ();
}

/// Fire-and-forget product analytics.
pub struct Analytics<Ev> {
    context: CapabilityContext<AnalyticsEvent, Ev>,
}

impl<Ev> Clone for Analytics<Ev> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<Ev> Capability<Ev> for Analytics<Ev> {
    type Operation = AnalyticsEvent;
    type MappedSelf<MappedEv> = Analytics<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Analytics::new(self.context.map_event(f))
    }
}

impl<Ev> Analytics<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<AnalyticsEvent, Ev>) -> Self {
        Self { context }
    }

    pub fn track(&self, event: AnalyticsEvent) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(event).await;
        });
    }
}

/// Tracker the tokio shell forwards analytics to (Mixpanel, pixels, ...).
pub trait AnalyticsSink: Send + Sync {
    fn track(&self, event: &AnalyticsEvent);
}

/// Writes events to the tracing log. Used when the host has no tracker wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn track(&self, event: &AnalyticsEvent) {
        info!(event = %event.name, properties = ?event.properties, "analytics");
    }
}
