// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Startup errors for the report collector.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
	#[error("invalid file name pattern: {0}")]
	Pattern(#[from] regex::Error),

	#[error(transparent)]
	Config(#[from] loom_report_config::ConfigError),

	#[error(transparent)]
	Mail(#[from] loom_report_smtp::MailError),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}
