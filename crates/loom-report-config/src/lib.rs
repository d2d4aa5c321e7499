// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the Loom error report SDK.
//!
//! Precedence (highest to lowest):
//! 1. Environment variables (`LOOM_REPORT_*`)
//! 2. Config file (`$XDG_CONFIG_HOME/loom/report.toml`)
//! 3. Built-in defaults

pub mod error;
pub mod layer;
pub mod paths;
pub mod sections;
pub mod sources;

use std::path::PathBuf;

pub use error::ConfigError;
pub use layer::ReportConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved report configuration.
#[derive(Debug, Clone)]
pub struct ReportConfig {
	pub spool: SpoolConfig,
	pub http: Option<HttpConfig>,
	pub smtp: Option<SmtpConfig>,
	pub log: LogConfig,
	pub traps: TrapsConfig,
	pub logging: LoggingConfig,
}

/// The configured delivery channel.
#[derive(Debug, Clone, Copy)]
pub enum TransportSelection<'a> {
	Http(&'a HttpConfig),
	Smtp(&'a SmtpConfig),
}

impl ReportConfig {
	/// HTTP wins when both sections are configured.
	pub fn transport(&self) -> Result<TransportSelection<'_>, ConfigError> {
		if let Some(http) = &self.http {
			return Ok(TransportSelection::Http(http));
		}
		if let Some(smtp) = &self.smtp {
			return Ok(TransportSelection::Smtp(smtp));
		}
		Err(ConfigError::NoTransport)
	}
}

/// Load configuration from defaults, the user config file and the
/// environment.
pub fn load_config() -> Result<ReportConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::user()),
		Box::new(EnvSource),
	])
}

/// Same as [`load_config`] with an explicit config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<ReportConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ReportConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ReportConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Resolve a merged layer, applying defaults and validation.
pub fn finalize(layer: ReportConfigLayer) -> Result<ReportConfig, ConfigError> {
	let spool = layer.spool.unwrap_or_default().finalize();
	let http = layer.http.unwrap_or_default().build()?;
	let smtp = layer.smtp.unwrap_or_default().build()?;
	let log = layer.log.unwrap_or_default().finalize()?;
	let traps = layer.traps.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	info!(
		spool = %spool.folder.display(),
		http_configured = http.is_some(),
		smtp_configured = smtp.is_some(),
		traps = ?traps.install,
		"report configuration loaded"
	);

	Ok(ReportConfig {
		spool,
		http,
		smtp,
		log,
		traps,
		logging,
	})
}
