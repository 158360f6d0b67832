//! # LIFO release stack.
//!
//! ## Rules
//! - Releases run in strict reverse registration order.
//! - A failing (or panicking) release never stops the ones below it; all
//!   failures are collected into one [`ScopeError`].
//! - [`Scope::close`] drains the stack; closing an empty scope is a no-op.
//! - Dropping a scope that still holds releases (future dropped, panic)
//!   hands the remaining stack, still LIFO, to the current tokio runtime.
//!   Without a runtime only synchronous releases run, inline.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::{ReleaseError, ScopeError};
use crate::events::{Bus, Event, EventKind};

use super::resource::Resource;

type SyncRelease = Box<dyn FnOnce() -> Result<(), ReleaseError> + Send>;
type AsyncRelease = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), ReleaseError>> + Send>;

enum Release {
    Sync(SyncRelease),
    Async(AsyncRelease),
}

struct Entry {
    name: String,
    release: Release,
}

/// Stack of release operations closed once at the end of a run.
///
/// # Example
/// ```
/// use plugvisor::{ReleaseError, Scope};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut scope = Scope::new("run");
/// scope.defer("first", || Ok(()));
/// scope.defer_async("second", || async { Err(ReleaseError::new("second", "socket reset")) });
///
/// let err = scope.close().await.unwrap_err();
/// assert_eq!(err.failures.len(), 1);
/// assert!(scope.close().await.is_ok());
/// # }
/// ```
pub struct Scope {
    name: String,
    entries: Vec<Entry>,
    bus: Option<Bus>,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            bus: None,
        }
    }

    /// Publishes `ResourceReleased` / `ReleaseFailed` on `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of pending releases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Takes ownership of `resource` and schedules its release.
    pub fn adopt<R: Resource>(&mut self, mut resource: R) {
        let name = resource.name().to_owned();
        self.push(
            name,
            Release::Async(Box::new(move || {
                async move { resource.release().await }.boxed()
            })),
        );
    }

    /// Schedules a synchronous release.
    pub fn defer<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: FnOnce() -> Result<(), ReleaseError> + Send + 'static,
    {
        self.push(name.into(), Release::Sync(Box::new(f)));
    }

    /// Schedules an asynchronous release.
    pub fn defer_async<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ReleaseError>> + Send + 'static,
    {
        self.push(name.into(), Release::Async(Box::new(move || f().boxed())));
    }

    fn push(&mut self, name: String, release: Release) {
        tracing::trace!(scope = %self.name, resource = %name, "resource registered");
        self.entries.push(Entry { name, release });
    }

    /// Releases everything on the stack, most recent first.
    pub async fn close(&mut self) -> Result<(), ScopeError> {
        let entries = std::mem::take(&mut self.entries);
        let failures = release_all(&self.name, entries, self.bus.as_ref()).await;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ScopeError { failures })
        }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let entries = std::mem::take(&mut self.entries);
        tracing::warn!(scope = %self.name, pending = entries.len(), "scope dropped without close");

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let name = std::mem::take(&mut self.name);
                let bus = self.bus.take();
                handle.spawn(async move {
                    release_all(&name, entries, bus.as_ref()).await;
                });
            }
            Err(_) => {
                for entry in entries.into_iter().rev() {
                    match entry.release {
                        Release::Sync(f) => {
                            let res = run_sync(&entry.name, f);
                            report(&self.name, &entry.name, &res, self.bus.as_ref());
                        }
                        Release::Async(_) => {
                            tracing::warn!(
                                scope = %self.name,
                                resource = %entry.name,
                                "async release skipped: no runtime"
                            );
                        }
                    }
                }
            }
        }
    }
}

async fn release_all(scope: &str, entries: Vec<Entry>, bus: Option<&Bus>) -> Vec<ReleaseError> {
    let mut failures = Vec::new();
    for entry in entries.into_iter().rev() {
        let res = match entry.release {
            Release::Sync(f) => run_sync(&entry.name, f),
            Release::Async(f) => AssertUnwindSafe(f())
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(ReleaseError::new(entry.name.as_str(), "release panicked"))),
        };
        report(scope, &entry.name, &res, bus);
        if let Err(e) = res {
            failures.push(e);
        }
    }
    failures
}

fn run_sync(name: &str, f: SyncRelease) -> Result<(), ReleaseError> {
    std::panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|_| Err(ReleaseError::new(name, "release panicked")))
}

fn report(scope: &str, resource: &str, res: &Result<(), ReleaseError>, bus: Option<&Bus>) {
    let ev = match res {
        Ok(()) => {
            tracing::trace!(scope, resource, "resource released");
            Event::new(EventKind::ResourceReleased).with_resource(resource)
        }
        Err(e) => {
            tracing::warn!(scope, resource, error = %e.error, "resource release failed");
            Event::new(EventKind::ReleaseFailed)
                .with_resource(resource)
                .with_reason(e.error.as_str())
        }
    };
    if let Some(bus) = bus {
        bus.publish(ev);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    fn recorder() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(log: &Arc<Mutex<Vec<String>>>, name: &str) -> impl FnOnce() -> Result<(), ReleaseError> + Send + 'static {
        let log = Arc::clone(log);
        let name = name.to_owned();
        move || {
            log.lock().unwrap().push(name);
            Ok(())
        }
    }

    struct Conn {
        id: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl Resource for Conn {
        fn name(&self) -> &str {
            self.id
        }

        async fn release(&mut self) -> Result<(), ReleaseError> {
            tokio::task::yield_now().await;
            self.log.lock().unwrap().push(self.id.to_owned());
            if self.fail {
                Err(ReleaseError::new(self.id, "reset by peer"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn releases_in_reverse_order() {
        let log = recorder();
        let mut scope = Scope::new("t");
        scope.defer("a", push(&log, "a"));
        scope.adopt(Conn { id: "b", log: log.clone(), fail: false });
        scope.defer("c", push(&log, "c"));

        scope.close().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["c", "b", "a"]);
        assert!(scope.is_empty());
    }

    #[tokio::test]
    async fn failures_do_not_short_circuit() {
        let log = recorder();
        let mut scope = Scope::new("t");
        scope.defer("a", push(&log, "a"));
        scope.adopt(Conn { id: "b", log: log.clone(), fail: true });
        scope.defer("c", || Err(ReleaseError::new("c", "locked")));
        scope.defer("d", || panic!("release bug"));

        let err = scope.close().await.unwrap_err();
        let failed: Vec<&str> = err.failures.iter().map(|f| f.resource.as_str()).collect();
        assert_eq!(failed, vec!["d", "c", "b"]);
        assert_eq!(*log.lock().unwrap(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn second_close_is_a_noop() {
        let log = recorder();
        let mut scope = Scope::new("t");
        scope.defer("a", push(&log, "a"));

        scope.close().await.unwrap();
        scope.close().await.unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn drop_hands_pending_releases_to_runtime() {
        let log = recorder();
        {
            let mut scope = Scope::new("t");
            scope.defer("a", push(&log, "a"));
            scope.adopt(Conn { id: "b", log: log.clone(), fail: false });
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(*log.lock().unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn drop_without_runtime_runs_sync_releases() {
        let log = recorder();
        {
            let mut scope = Scope::new("t");
            scope.defer("a", push(&log, "a"));
            scope.defer_async("b", || async { Ok(()) });
            scope.defer("c", push(&log, "c"));
        }
        assert_eq!(*log.lock().unwrap(), vec!["c", "a"]);
    }

    #[tokio::test]
    async fn bus_reports_each_release() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let mut scope = Scope::new("t").with_bus(bus);
        scope.defer("ok", || Ok(()));
        scope.defer("bad", || Err(ReleaseError::new("bad", "nope")));

        let _ = scope.close().await;
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::ReleaseFailed);
        assert_eq!(first.resource.as_deref(), Some("bad"));
        assert_eq!(second.kind, EventKind::ResourceReleased);
    }
}
