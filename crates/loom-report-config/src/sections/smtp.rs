// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SMTP delivery section.

use std::time::Duration;

use loom_report_core::SecretString;
use serde::{Deserialize, Serialize};

use super::DEFAULT_TIMEOUT_SECS;
use crate::error::ConfigError;

const DEFAULT_PORT: u16 = 25;
const DEFAULT_SUBJECT: &str = "Error report";
const DEFAULT_BODY: &str = "Log Files are attached";
const DEFAULT_ATTACHMENT_NAME: &str = "Report.zip";

/// Transport security for the SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
	/// Plain connection.
	#[default]
	None,
	StartTls,
	/// Implicit TLS from the first byte.
	Tls,
}

impl std::str::FromStr for TlsMode {
	type Err = ConfigError;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value.to_lowercase().as_str() {
			"none" | "false" => Ok(Self::None),
			"starttls" => Ok(Self::StartTls),
			"tls" | "true" => Ok(Self::Tls),
			_ => Err(ConfigError::invalid_value(
				"smtp.tls",
				format!("'{value}', expected none, starttls or tls"),
			)),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmtpConfigLayer {
	pub host: Option<String>,
	pub port: Option<u16>,
	pub username: Option<String>,
	#[serde(skip_serializing)]
	pub password: Option<SecretString>,
	/// Authenticate with whatever the environment provides when no
	/// explicit username is set.
	pub use_default_credentials: Option<bool>,
	pub tls: Option<TlsMode>,
	pub from: Option<String>,
	pub to: Option<Vec<String>>,
	pub reply_to: Option<String>,
	pub subject: Option<String>,
	pub body: Option<String>,
	pub attachment_name: Option<String>,
	pub timeout_secs: Option<u64>,
}

impl SmtpConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.host.is_some() {
			self.host = other.host;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
		if other.username.is_some() {
			self.username = other.username;
		}
		if other.password.is_some() {
			self.password = other.password;
		}
		if other.use_default_credentials.is_some() {
			self.use_default_credentials = other.use_default_credentials;
		}
		if other.tls.is_some() {
			self.tls = other.tls;
		}
		if other.from.is_some() {
			self.from = other.from;
		}
		if other.to.is_some() {
			self.to = other.to;
		}
		if other.reply_to.is_some() {
			self.reply_to = other.reply_to;
		}
		if other.subject.is_some() {
			self.subject = other.subject;
		}
		if other.body.is_some() {
			self.body = other.body;
		}
		if other.attachment_name.is_some() {
			self.attachment_name = other.attachment_name;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
	}

	/// `Ok(None)` when no host is set.
	pub fn build(self) -> Result<Option<SmtpConfig>, ConfigError> {
		let Some(host) = self.host.filter(|h| !h.trim().is_empty()) else {
			return Ok(None);
		};

		let from = self
			.from
			.filter(|f| !f.trim().is_empty())
			.ok_or_else(|| ConfigError::Validation("smtp.from is required when smtp.host is set".into()))?;

		let to: Vec<String> = self
			.to
			.unwrap_or_default()
			.into_iter()
			.map(|t| t.trim().to_string())
			.filter(|t| !t.is_empty())
			.collect();
		if to.is_empty() {
			return Err(ConfigError::Validation(
				"smtp.to needs at least one recipient".into(),
			));
		}

		if self.password.is_some() && self.username.is_none() {
			return Err(ConfigError::Validation(
				"smtp.password is set without smtp.username".into(),
			));
		}

		Ok(Some(SmtpConfig {
			host,
			port: self.port.unwrap_or(DEFAULT_PORT),
			username: self.username,
			password: self.password,
			use_default_credentials: self.use_default_credentials.unwrap_or(false),
			tls: self.tls.unwrap_or_default(),
			from,
			to,
			reply_to: self.reply_to.filter(|r| !r.trim().is_empty()),
			subject: self.subject.unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
			body: self.body.unwrap_or_else(|| DEFAULT_BODY.to_string()),
			attachment_name: self
				.attachment_name
				.unwrap_or_else(|| DEFAULT_ATTACHMENT_NAME.to_string()),
			timeout: Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
		}))
	}
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
	pub host: String,
	pub port: u16,
	pub username: Option<String>,
	pub password: Option<SecretString>,
	pub use_default_credentials: bool,
	pub tls: TlsMode,
	pub from: String,
	pub to: Vec<String>,
	pub reply_to: Option<String>,
	pub subject: String,
	pub body: String,
	pub attachment_name: String,
	pub timeout: Duration,
}
