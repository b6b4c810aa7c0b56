//! Cached client-credentials tokens and retrying Microsoft Graph mail dispatch for form handlers.
//!
//! A [`cache::TokenCache`] keeps one bearer token per credential set and collapses concurrent
//! refreshes into a single identity-provider exchange. A [`mail::MailDispatcher`] posts messages
//! to the Graph `sendMail` endpoint with bounded exponential backoff.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod mail;
pub mod obs;
pub mod provider;
pub mod retry;

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::OnceCell as AsyncOnceCell;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
