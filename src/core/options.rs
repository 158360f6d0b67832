//! Per-run options.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Options of one `run_plan` call.
///
/// Start from [`RunOptions::with_defaults`] and override with the `with_*` methods.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use plugvisor::{Config, RunOptions};
///
/// let opts = RunOptions::with_defaults(&Config::default())
///     .with_timeout(Duration::from_secs(2))
///     .with_max_adapters(4)
///     .with_tag("trigger", "nightly")
///     .with_publish_outputs(true);
///
/// assert_eq!(opts.max_adapters, Some(4));
/// assert_eq!(opts.run_tags["trigger"], "nightly");
/// ```
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Per-dispatch timeout (`None` = no timeout).
    pub timeout: Option<Duration>,
    /// Concurrent adapter calls (`None` = unlimited).
    pub max_adapters: Option<usize>,
    pub run_tags: BTreeMap<String, String>,
    pub tenant: Option<Arc<str>>,
    pub workspace: Option<Arc<str>>,
    /// Publish every successful output to the delivery queue.
    pub publish_outputs: bool,
    /// Cancels the run: nothing new is dispatched once it fires.
    pub cancel: CancellationToken,
}

impl RunOptions {
    /// Options inheriting timeout and concurrency from `cfg`.
    pub fn with_defaults(cfg: &Config) -> Self {
        Self {
            timeout: cfg.default_timeout(),
            max_adapters: cfg.concurrency_limit(),
            run_tags: BTreeMap::new(),
            tenant: None,
            workspace: None,
            publish_outputs: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the dispatch timeout; zero disables it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Sets the concurrency limit; zero means unlimited.
    pub fn with_max_adapters(mut self, n: usize) -> Self {
        self.max_adapters = (n > 0).then_some(n);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.run_tags.insert(key.into(), value.into());
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<Arc<str>>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with_workspace(mut self, workspace: impl Into<Arc<str>>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn with_publish_outputs(mut self, publish: bool) -> Self {
        self.publish_outputs = publish;
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Permits of the run's dispatch semaphore; `None` means no semaphore.
    ///
    /// Zero and anything a tokio semaphore cannot hold are unlimited.
    pub(crate) fn permit_limit(&self) -> Option<usize> {
        self.max_adapters.filter(|&n| n > 0 && n <= Semaphore::MAX_PERMITS)
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::with_defaults(&Config::default())
    }
}
