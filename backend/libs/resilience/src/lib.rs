/// Resilience patterns for storage access
///
/// This library provides:
/// - **Retry**: bounded attempts with quadratic backoff around transient
///   storage conflicts (deadlocks, serialization failures, timeouts)
/// - **Cancellation**: a cloneable signal observed between attempts so a
///   shutting-down process never starts new work
///
/// # Example: transactional write with retry
///
/// ```rust,no_run
/// use resilience::{with_retry, CancelSignal, RetryConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let config = RetryConfig::default();
///
///     let result = with_retry("insert_post", &config, &CancelSignal::never(), || async {
///         // Your transaction here
///         Ok::<_, String>(())
///     })
///     .await;
/// }
/// ```

pub mod cancel;
pub mod retry;

// Re-export main types for convenience
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use retry::{is_transient_message, with_retry, RetryConfig, RetryError, Retryable};
