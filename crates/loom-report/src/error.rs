// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the report SDK.

use thiserror::Error;

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;

#[derive(Debug, Error)]
pub enum SdkError {
	#[error(transparent)]
	Report(#[from] loom_report_core::ReportError),

	#[error(transparent)]
	Config(#[from] loom_report_config::ConfigError),

	#[error(transparent)]
	Mail(#[from] loom_report_smtp::MailError),

	#[error("HTTP client error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// Another last-chance handler already owns the panic hook.
	#[error("a last-chance handler is already installed")]
	AlreadyInstalled,

	#[error("failed to initialise logging: {0}")]
	Logging(String),
}
