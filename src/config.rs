//! Session configuration: API location, storage keys, and renewal cadence.

// self
use crate::{_prelude::*, error::ConfigError, store::StorageKeys};

/// Settings shared by every component of a [`Session`](crate::flows::Session).
///
/// Durations are written as whole seconds when the configuration is loaded from JSON:
///
/// ```json
/// { "api_base": "https://api.example.com/api/", "renewal_period": 1, "renewal_lead_time": 0 }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
	/// Base URL the `auth/*` endpoint paths are appended to.
	pub api_base: Url,
	/// Keys the access and refresh tokens are persisted under.
	#[serde(default)]
	pub storage_keys: StorageKeys,
	/// How often the renewal timer re-reads the access token's lifetime.
	#[serde(default = "SessionConfig::default_renewal_period", with = "seconds")]
	pub renewal_period: Duration,
	/// Remaining lifetime at or below which the renewal timer refreshes proactively.
	#[serde(default, with = "seconds")]
	pub renewal_lead_time: Duration,
}
impl SessionConfig {
	const DEFAULT_RENEWAL_PERIOD: Duration = Duration::SECOND;

	/// Creates a configuration for `api_base` with default keys and a one-second timer.
	pub fn new(api_base: Url) -> Result<Self, ConfigError> {
		let config = Self {
			api_base,
			storage_keys: StorageKeys::default(),
			renewal_period: Self::DEFAULT_RENEWAL_PERIOD,
			renewal_lead_time: Duration::ZERO,
		};

		config.validate()?;

		Ok(config)
	}

	/// Parses and validates a JSON configuration document.
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		let mut deserializer = serde_json::Deserializer::from_str(json);
		let config: Self = serde_path_to_error::deserialize(&mut deserializer)?;

		config.validate()?;

		Ok(config)
	}

	/// Overrides the storage keys.
	pub fn with_storage_keys(mut self, keys: StorageKeys) -> Self {
		self.storage_keys = keys;

		self
	}

	/// Overrides the renewal timer period.
	pub fn with_renewal_period(mut self, period: Duration) -> Result<Self, ConfigError> {
		if !period.is_positive() {
			return Err(ConfigError::NonPositiveRenewalPeriod);
		}

		self.renewal_period = period;

		Ok(self)
	}

	/// Overrides the proactive lead time; negative values clamp to zero.
	pub fn with_renewal_lead_time(mut self, lead_time: Duration) -> Self {
		self.renewal_lead_time = if lead_time.is_negative() { Duration::ZERO } else { lead_time };

		self
	}

	/// Resolves `path` (such as `auth/login`) against the API base.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		let mut url = self.api_base.clone();

		url.path_segments_mut()
			.map_err(|_| ConfigError::InvalidBaseUrl { url: self.api_base.to_string() })?
			.pop_if_empty()
			.extend(path.split('/').filter(|segment| !segment.is_empty()));

		Ok(url)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.api_base.cannot_be_a_base() {
			return Err(ConfigError::InvalidBaseUrl { url: self.api_base.to_string() });
		}
		if !self.renewal_period.is_positive() {
			return Err(ConfigError::NonPositiveRenewalPeriod);
		}

		Ok(())
	}

	fn default_renewal_period() -> Duration {
		Self::DEFAULT_RENEWAL_PERIOD
	}
}

mod seconds {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::seconds)
	}
}
