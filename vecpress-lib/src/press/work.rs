use std::time::Duration;

use rama::error::OpaqueError;

/// One unit of work against the target under press.
///
/// Returns how long the work took on success.
/// Errors are only counted, never retried.
pub trait Work: Send + Sync + 'static {
    fn run(&self) -> impl Future<Output = Result<Duration, OpaqueError>> + Send;
}

impl<F, Fut> Work for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Duration, OpaqueError>> + Send,
{
    fn run(&self) -> impl Future<Output = Result<Duration, OpaqueError>> + Send {
        (self)()
    }
}
