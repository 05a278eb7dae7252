use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{BillingPlan, PackageType};

/// What the host's checkout popup needs to open a payment session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupRequest {
    pub listing_ref: String,
    pub package: PackageType,
    pub plan: BillingPlan,
    pub price_usd: u32,
}

impl Operation for PopupRequest {
    type Output = GatewayResult;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub email: String,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum GatewayError {
    #[error("checkout popup dismissed")]
    Dismissed,

    #[error("checkout popup unavailable on this page")]
    Unavailable,

    #[error("payment failed: {0}")]
    Failed(String),
}

pub type GatewayResult = Result<PaymentReceipt, GatewayError>;

/// Opens the payment popup injected by the host page.
pub struct PaymentPopup<Ev> {
    context: CapabilityContext<PopupRequest, Ev>,
}

impl<Ev> Clone for PaymentPopup<Ev> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<Ev> Capability<Ev> for PaymentPopup<Ev> {
    type Operation = PopupRequest;
    type MappedSelf<MappedEv> = PaymentPopup<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        PaymentPopup::new(self.context.map_event(f))
    }
}

impl<Ev> PaymentPopup<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<PopupRequest, Ev>) -> Self {
        Self { context }
    }

    pub fn open<F>(&self, request: PopupRequest, callback: F)
    where
        F: FnOnce(GatewayResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(request).await;
            ctx.update_app(callback(result));
        });
    }
}

/// Host-side popup used by the tokio shell.
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn checkout_popup(&self, request: &PopupRequest) -> GatewayResult;
}
