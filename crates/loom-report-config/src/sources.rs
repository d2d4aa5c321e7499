// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, TOML files and environment
//! variables.

use std::path::PathBuf;

use loom_report_core::SecretString;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ReportConfigLayer;
use crate::sections::{
	HttpConfigLayer, LogConfigLayer, LoggingConfigLayer, SmtpConfigLayer, SpoolConfigLayer,
	TrapsConfigLayer,
};

/// Source precedence levels (higher overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ReportConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ReportConfigLayer, ConfigError> {
		Ok(ReportConfigLayer::default())
	}
}

/// A TOML file. A missing file is an empty layer, not an error.
pub struct TomlSource {
	path: Option<PathBuf>,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: Some(path.into()),
		}
	}

	/// `$XDG_CONFIG_HOME/loom/report.toml`.
	pub fn user() -> Self {
		Self {
			path: crate::paths::user_config_file(),
		}
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ReportConfigLayer, ConfigError> {
		let Some(path) = &self.path else {
			debug!("no home directory, skipping user config file");
			return Ok(ReportConfigLayer::default());
		};
		if !path.exists() {
			debug!(path = %path.display(), "config file not found, skipping");
			return Ok(ReportConfigLayer::default());
		}

		let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
			path: path.clone(),
			source: e,
		})?;
		let layer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: path.clone(),
			source: e,
		})?;

		trace!(path = %path.display(), "parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variables named `LOOM_REPORT_<SECTION>_<FIELD>`.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ReportConfigLayer, ConfigError> {
		Ok(ReportConfigLayer {
			spool: Some(SpoolConfigLayer {
				folder: env_var("LOOM_REPORT_SPOOL_FOLDER").map(PathBuf::from),
			}),
			http: Some(HttpConfigLayer {
				url: env_var("LOOM_REPORT_HTTP_URL"),
				timeout_secs: env_parse("LOOM_REPORT_HTTP_TIMEOUT_SECS")?,
				user_agent: env_var("LOOM_REPORT_HTTP_USER_AGENT"),
			}),
			smtp: Some(load_smtp_from_env()?),
			log: Some(LogConfigLayer {
				file: env_var("LOOM_REPORT_LOG_FILE").map(PathBuf::from),
				daily_folder: env_var("LOOM_REPORT_LOG_DAILY_FOLDER").map(PathBuf::from),
				max_size_bytes: env_parse("LOOM_REPORT_LOG_MAX_SIZE_BYTES")?,
				instance: env_var("LOOM_REPORT_LOG_INSTANCE"),
				utc: env_bool("LOOM_REPORT_LOG_UTC"),
				auto_flush: env_bool("LOOM_REPORT_LOG_AUTO_FLUSH"),
				lock_name: env_var("LOOM_REPORT_LOG_LOCK_NAME"),
			}),
			traps: Some(TrapsConfigLayer {
				install: env_parse("LOOM_REPORT_TRAPS_INSTALL")?,
			}),
			logging: Some(LoggingConfigLayer {
				level: env_var("LOOM_REPORT_LOGGING_LEVEL"),
				json: env_bool("LOOM_REPORT_LOGGING_JSON"),
			}),
		})
	}
}

fn load_smtp_from_env() -> Result<SmtpConfigLayer, ConfigError> {
	Ok(SmtpConfigLayer {
		host: env_var("LOOM_REPORT_SMTP_HOST"),
		port: env_parse("LOOM_REPORT_SMTP_PORT")?,
		username: env_var("LOOM_REPORT_SMTP_USERNAME"),
		password: load_secret_env("LOOM_REPORT_SMTP_PASSWORD")?,
		use_default_credentials: env_bool("LOOM_REPORT_SMTP_USE_DEFAULT_CREDENTIALS"),
		tls: env_parse("LOOM_REPORT_SMTP_TLS")?,
		from: env_var("LOOM_REPORT_SMTP_FROM"),
		to: env_list("LOOM_REPORT_SMTP_TO"),
		reply_to: env_var("LOOM_REPORT_SMTP_REPLY_TO"),
		subject: env_var("LOOM_REPORT_SMTP_SUBJECT"),
		body: env_var("LOOM_REPORT_SMTP_BODY"),
		attachment_name: env_var("LOOM_REPORT_SMTP_ATTACHMENT_NAME"),
		timeout_secs: env_parse("LOOM_REPORT_SMTP_TIMEOUT_SECS")?,
	})
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_list(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|v| {
		v.split([',', ';'])
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
			.collect()
	})
}

fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
	T: std::str::FromStr,
	T::Err: std::fmt::Display,
{
	match env_var(name) {
		Some(v) => v
			.parse()
			.map(Some)
			.map_err(|e| ConfigError::invalid_value(name, format!("'{v}': {e}"))),
		None => Ok(None),
	}
}

/// Reads `VAR_FILE` (a path to a file holding the secret) in preference to
/// `VAR`. One trailing newline in the file is dropped.
fn load_secret_env(var: &str) -> Result<Option<SecretString>, ConfigError> {
	let file_var = format!("{var}_FILE");
	if let Some(path) = env_var(&file_var) {
		let path = PathBuf::from(path);
		let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileRead {
			path: path.clone(),
			source: e,
		})?;
		let secret = content.strip_suffix('\n').unwrap_or(&content);
		return Ok(Some(SecretString::new(secret)));
	}
	Ok(env_var(var).map(SecretString::new))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serial_test::serial;
	use tempfile::TempDir;

	fn clear_report_env() {
		for (key, _) in std::env::vars() {
			if key.starts_with("LOOM_REPORT_") {
				std::env::remove_var(key);
			}
		}
	}

	#[test]
	fn precedence_ordering() {
		assert!(Precedence::Defaults < Precedence::ConfigFile);
		assert!(Precedence::ConfigFile < Precedence::Environment);
	}

	#[test]
	fn missing_toml_file_is_empty_layer() {
		let dir = TempDir::new().unwrap();
		let layer = TomlSource::new(dir.path().join("absent.toml")).load().unwrap();
		assert!(layer.http.is_none());
		assert!(layer.smtp.is_none());
	}

	#[test]
	fn malformed_toml_reports_path() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("report.toml");
		std::fs::write(&path, "[http\nurl = ").unwrap();
		let err = TomlSource::new(&path).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	#[serial]
	fn env_source_reads_sections() {
		clear_report_env();
		std::env::set_var("LOOM_REPORT_SMTP_HOST", "mail.example.com");
		std::env::set_var("LOOM_REPORT_SMTP_PORT", "2525");
		std::env::set_var("LOOM_REPORT_SMTP_TO", "a@example.com; b@example.com");
		std::env::set_var("LOOM_REPORT_TRAPS_INSTALL", "main_thread");

		let layer = EnvSource.load().unwrap();
		let smtp = layer.smtp.unwrap();
		assert_eq!(smtp.host.as_deref(), Some("mail.example.com"));
		assert_eq!(smtp.port, Some(2525));
		assert_eq!(
			smtp.to,
			Some(vec!["a@example.com".to_string(), "b@example.com".to_string()])
		);
		assert_eq!(layer.traps.unwrap().install, Some(crate::Traps::MainThread));

		clear_report_env();
	}

	#[test]
	#[serial]
	fn env_source_rejects_bad_numbers() {
		clear_report_env();
		std::env::set_var("LOOM_REPORT_HTTP_TIMEOUT_SECS", "soon");
		let err = EnvSource.load().unwrap_err();
		assert!(err.to_string().contains("LOOM_REPORT_HTTP_TIMEOUT_SECS"));
		clear_report_env();
	}

	#[test]
	#[serial]
	fn password_file_wins_over_plain_variable() {
		clear_report_env();
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("smtp-password");
		std::fs::write(&path, "from-file\n").unwrap();
		std::env::set_var("LOOM_REPORT_SMTP_PASSWORD", "from-env");
		std::env::set_var("LOOM_REPORT_SMTP_PASSWORD_FILE", &path);

		let secret = load_secret_env("LOOM_REPORT_SMTP_PASSWORD").unwrap().unwrap();
		assert_eq!(secret.expose(), "from-file");

		clear_report_env();
	}
}
