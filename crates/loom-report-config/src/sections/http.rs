// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP upload section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::DEFAULT_TIMEOUT_SECS;
use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HttpConfigLayer {
	pub url: Option<String>,
	pub timeout_secs: Option<u64>,
	pub user_agent: Option<String>,
}

impl HttpConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.url.is_some() {
			self.url = other.url;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
		if other.user_agent.is_some() {
			self.user_agent = other.user_agent;
		}
	}

	/// `Ok(None)` when no URL is set.
	pub fn build(self) -> Result<Option<HttpConfig>, ConfigError> {
		let Some(url) = self.url.filter(|u| !u.trim().is_empty()) else {
			return Ok(None);
		};

		if !(url.starts_with("http://") || url.starts_with("https://")) {
			return Err(ConfigError::invalid_value(
				"http.url",
				format!("'{url}' is not an http(s) URL"),
			));
		}

		let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
		if timeout_secs == 0 {
			return Err(ConfigError::invalid_value("http.timeout_secs", "must be greater than zero"));
		}

		Ok(Some(HttpConfig {
			url,
			timeout: Duration::from_secs(timeout_secs),
			user_agent: self.user_agent,
		}))
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
	pub url: String,
	pub timeout: Duration,
	pub user_agent: Option<String>,
}
