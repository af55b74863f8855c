//! Failures a route provider may report.

use thiserror::Error;

/// Errors from [`crate::route::RouteProvider::route`].
///
/// Every variant is recoverable: the optimizer moves on to the next
/// provider in its chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider has no endpoint or credentials configured.
    #[error("route provider {provider} is not configured")]
    Unconfigured {
        /// Provider name.
        provider: String,
    },
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Requested URL.
        url: String,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },
    /// The service could not be reached.
    #[error("network error requesting {url}: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Underlying error description.
        message: String,
    },
    /// The service answered with a non-success HTTP status.
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Underlying error description.
        message: String,
    },
    /// The service reported an application-level error, such as no route.
    #[error("routing service error {code}: {message}")]
    Service {
        /// Service status code.
        code: String,
        /// Service message.
        message: String,
    },
    /// The response body could not be decoded.
    #[error("failed to parse routing response: {message}")]
    Parse {
        /// Decoder error description.
        message: String,
    },
    /// The response decoded but does not describe a usable route.
    #[error("route from {provider} is malformed: {reason}")]
    Malformed {
        /// Provider name.
        provider: String,
        /// What was wrong.
        reason: String,
    },
}
