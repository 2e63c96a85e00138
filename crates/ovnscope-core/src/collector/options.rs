//! Per-call collection options.

use tracing::Dispatch;

/// Options for one collection, passed explicitly by the caller.
///
/// Nothing in the pipeline reads process-wide option state: the only global
/// is the default tracing subscriber, and `dispatch` overrides it for the
/// duration of the call.
#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    /// Where this collection's diagnostic events go. `None` uses the
    /// process-wide default subscriber.
    pub dispatch: Option<Dispatch>,
    /// Include raw probe output in diagnostic events. When unset only byte
    /// counts are logged.
    pub include_raw_probe_output: bool,
}

impl CollectOptions {
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn with_raw_probe_output(mut self, include: bool) -> Self {
        self.include_raw_probe_output = include;
        self
    }
}
