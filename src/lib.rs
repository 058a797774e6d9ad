//! Client-side bearer session management: token storage, single-flight refresh, transparent
//! 401 replay, and proactive renewal in one crate.
//!
//! The pieces compose leaves first:
//!
//! - [`auth`] decodes unsigned JWT-style claims and wraps secrets so they never leak into logs.
//! - [`store::TokenStore`] is the single writer for the access/refresh pair and publishes the
//!   derived [`signal::SessionState`] on every write.
//! - [`flows::RefreshCoordinator`] guarantees at most one refresh call is outstanding and
//!   hands the same outcome to every waiter in arrival order.
//! - [`flows::Gatekeeper`] attaches the bearer, refreshes on 401, and replays the original
//!   request exactly once.
//! - [`flows::RenewalTimer`] refreshes proactively while a caller keeps it alive.
//!
//! [`flows::Session`] wires all of them together over one [`http::HttpTransport`].

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod obs;
pub mod signal;
pub mod store;
#[cfg(any(test, feature = "test"))]
#[doc(hidden)]
pub mod _preludet;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, VecDeque},
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::{
			Arc,
			atomic::{AtomicBool, AtomicU64, Ordering},
		},
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
