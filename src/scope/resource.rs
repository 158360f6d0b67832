//! Resource abstraction released by a [`Scope`](super::Scope).

use async_trait::async_trait;

use crate::error::ReleaseError;

/// A handle with an explicit release operation.
///
/// The handle never releases itself; the scope that adopted it calls
/// [`release`](Resource::release) exactly once.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use plugvisor::{ReleaseError, Resource};
///
/// struct Connection { open: bool }
///
/// #[async_trait]
/// impl Resource for Connection {
///     fn name(&self) -> &str { "db" }
///
///     async fn release(&mut self) -> Result<(), ReleaseError> {
///         self.open = false;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Resource: Send + 'static {
    /// Name reported in release events and errors.
    fn name(&self) -> &str;

    /// Releases the resource.
    async fn release(&mut self) -> Result<(), ReleaseError>;
}
