// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-wide `tracing` setup for applications embedding the SDK.

use std::sync::Arc;

use loom_report_config::{LogConfig, ReportConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::{Result, SdkError};
use crate::listener::{ListenerId, ListenerLayer, ListenerRegistry};
use crate::logfile::LogFile;

/// What [`init`] wired up.
pub struct LoggingHandle {
	registry: Arc<ListenerRegistry>,
	log_file: Option<AttachedLogFile>,
}

pub struct AttachedLogFile {
	pub id: ListenerId,
	pub file: Arc<LogFile>,
}

impl LoggingHandle {
	pub fn registry(&self) -> &Arc<ListenerRegistry> {
		&self.registry
	}

	pub fn log_file(&self) -> Option<&AttachedLogFile> {
		self.log_file.as_ref()
	}
}

/// Installs the global subscriber: an `EnvFilter` (`RUST_LOG` wins over the
/// configured level), a stderr `fmt` layer and a [`ListenerLayer`] over
/// [`ListenerRegistry::global`]. The configured log file, if any, is
/// attached as the first listener.
pub fn init(config: &ReportConfig) -> Result<LoggingHandle> {
	let registry = ListenerRegistry::global();
	let json = config.logging.json;

	tracing_subscriber::registry()
		.with(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
		)
		.with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
		.with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
		.with(ListenerLayer::new(Arc::clone(&registry)))
		.try_init()
		.map_err(|e| SdkError::Logging(e.to_string()))?;

	let log_file = attach_log_file(&registry, &config.log)?;
	tracing::debug!(
		log_file = ?log_file.as_ref().map(|f| f.file.path().display().to_string()),
		"logging initialised"
	);

	Ok(LoggingHandle { registry, log_file })
}

/// Opens the configured log file and attaches it to `registry`.
pub fn attach_log_file(
	registry: &ListenerRegistry,
	config: &LogConfig,
) -> Result<Option<AttachedLogFile>> {
	let Some(file) = LogFile::from_config(config)? else {
		return Ok(None);
	};
	let file = Arc::new(file);
	let id = registry.attach(Arc::clone(&file));
	Ok(Some(AttachedLogFile { id, file }))
}
