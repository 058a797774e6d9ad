//! Session-level error types shared across the store, transport, and flows.

// self
use crate::_prelude::*;

/// Session-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical session error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, body streaming).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// An auth endpoint answered with a non-success status.
	#[error("The {endpoint} endpoint rejected the request with status {status}.")]
	Rejected {
		/// Endpoint label (`login`, `refresh`, ...).
		endpoint: &'static str,
		/// HTTP status code.
		status: u16,
	},
	/// An auth endpoint succeeded at the transport level but returned no usable token.
	#[error("The {endpoint} endpoint returned no usable token.")]
	NoTokenInResponse {
		/// Endpoint label.
		endpoint: &'static str,
	},
	/// An auth endpoint returned a body that does not match its contract.
	#[error("The {endpoint} endpoint returned malformed JSON.")]
	ResponseParse {
		/// Endpoint label.
		endpoint: &'static str,
		/// HTTP status code.
		status: u16,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The server rejected a request and the session could not be recovered.
	#[error("Request was rejected with status {status} and the session could not be renewed.")]
	AuthorizationFailure {
		/// Status of the original rejected response.
		status: u16,
		/// Refresh failure that ended the session, when one was attempted.
		#[source]
		refresh: Option<Arc<Error>>,
	},
	/// The refresh task stopped before resolving its waiters (runtime shutdown).
	#[error("Token refresh was abandoned before it completed.")]
	RefreshAbandoned,
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] http::Error),
	/// Request body could not be encoded.
	#[error("Request body could not be encoded.")]
	RequestBody(#[from] serde_json::Error),
	/// The API base URL cannot carry path segments.
	#[error("API base URL `{url}` cannot be used as a base.")]
	InvalidBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// The renewal period must be positive.
	#[error("Renewal period must be positive.")]
	NonPositiveRenewalPeriod,
	/// Configuration document could not be parsed.
	#[error("Configuration is invalid.")]
	Parse(#[from] serde_path_to_error::Error<serde_json::Error>),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<http::header::InvalidHeaderValue> for ConfigError {
	fn from(e: http::header::InvalidHeaderValue) -> Self {
		Self::HttpRequest(e.into())
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {uri}.")]
	Network {
		/// Target of the failed request.
		uri: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error raised while calling `uri`.
	pub fn network(
		uri: impl Display,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { uri: uri.to_string(), source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn authorization_failure_exposes_refresh_cause() {
		let cause = Arc::new(Error::NoTokenInResponse { endpoint: "refresh" });
		let error = Error::AuthorizationFailure { status: 401, refresh: Some(cause) };
		let source = StdError::source(&error).expect("Refresh cause should be the source.");

		assert!(error.to_string().contains("401"));
		assert_eq!(source.to_string(), "The refresh endpoint returned no usable token.");
	}

	#[test]
	fn network_errors_name_their_target() {
		let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
		let error: Error =
			TransportError::network("https://api.example.com/auth/refresh", io).into();

		assert!(error.to_string().contains("https://api.example.com/auth/refresh"));
		assert!(StdError::source(&error).is_some());
	}
}
