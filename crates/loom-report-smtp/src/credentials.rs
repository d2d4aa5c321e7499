// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_report_config::SmtpConfig;
use loom_report_core::SecretString;

/// Environment variables consulted for [`MailCredentials::Ambient`].
pub const AMBIENT_USERNAME_VAR: &str = "SMTP_USERNAME";
pub const AMBIENT_PASSWORD_VAR: &str = "SMTP_PASSWORD";

/// How the transport authenticates with the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum MailCredentials {
	/// Unauthenticated relay.
	None,
	Explicit {
		username: String,
		password: SecretString,
	},
	/// Read `SMTP_USERNAME` / `SMTP_PASSWORD` from the process environment
	/// at send time; unauthenticated if either is missing.
	Ambient,
}

impl MailCredentials {
	/// An explicit username always wins over ambient credentials.
	pub fn from_config(config: &SmtpConfig) -> Self {
		match (&config.username, &config.password) {
			(Some(username), password) => Self::Explicit {
				username: username.clone(),
				password: password.clone().unwrap_or_else(|| SecretString::new("")),
			},
			(None, _) if config.use_default_credentials => Self::Ambient,
			(None, _) => Self::None,
		}
	}

	pub(crate) fn resolve(&self) -> Option<(String, String)> {
		match self {
			Self::None => None,
			Self::Explicit { username, password } => {
				Some((username.clone(), password.expose().to_string()))
			}
			Self::Ambient => {
				let username = std::env::var(AMBIENT_USERNAME_VAR).ok().filter(|u| !u.is_empty())?;
				let password = std::env::var(AMBIENT_PASSWORD_VAR).ok()?;
				Some((username, password))
			}
		}
	}
}
