use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

/// Page interactions outside the view model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageOperation {
    /// Checkout was attempted without a listing; draw the user back to search.
    FocusAddressSearch,
}

impl Operation for PageOperation {
    type Output = ();
}

pub struct Page<Ev> {
    context: CapabilityContext<PageOperation, Ev>,
}

impl<Ev> Clone for Page<Ev> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<Ev> Capability<Ev> for Page<Ev> {
    type Operation = PageOperation;
    type MappedSelf<MappedEv> = Page<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Page::new(self.context.map_event(f))
    }
}

impl<Ev> Page<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<PageOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn focus_address_search(&self) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(PageOperation::FocusAddressSearch).await;
        });
    }
}
