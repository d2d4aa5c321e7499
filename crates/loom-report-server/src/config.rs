// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Command line and environment configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use loom_report_config::{SmtpConfig, SmtpConfigLayer};
use regex::Regex;

use crate::error::Result;
use crate::upload::UploadPolicy;

/// Receives error reports uploaded by `loom-report` clients.
#[derive(Parser, Debug, Clone)]
#[command(name = "loom-report-server", about = "Error report collector", version)]
pub struct ServerArgs {
	/// Address to listen on.
	#[arg(long, env = "LOOM_REPORT_SERVER_LISTEN", default_value = "0.0.0.0:8080")]
	pub listen: SocketAddr,

	/// Route accepting uploads.
	#[arg(long, env = "LOOM_REPORT_SERVER_PATH", default_value = "/")]
	pub path: String,

	/// Directory accepted uploads are stored in.
	#[arg(long, env = "LOOM_REPORT_SERVER_UPLOAD_DIR", default_value = "uploads")]
	pub upload_dir: PathBuf,

	/// Plain-text log of accepted and rejected uploads.
	#[arg(long, env = "LOOM_REPORT_SERVER_ACTIVITY_LOG")]
	pub activity_log: Option<PathBuf>,

	/// Client addresses allowed to upload. Empty allows everyone.
	#[arg(long, env = "LOOM_REPORT_SERVER_ALLOWED_ADDRESSES", value_delimiter = ',')]
	pub allowed_addresses: Vec<IpAddr>,

	/// Pattern the uploaded file name must contain. Empty disables the check.
	#[arg(long, env = "LOOM_REPORT_SERVER_NAME_PATTERN", default_value = r"(\w+\.)\w+")]
	pub name_pattern: String,

	/// Accepted file extensions. Empty accepts any.
	#[arg(
		long,
		env = "LOOM_REPORT_SERVER_ALLOWED_EXTENSIONS",
		value_delimiter = ',',
		default_value = "zip"
	)]
	pub allowed_extensions: Vec<String>,

	/// Accepted MIME types. Empty accepts any.
	#[arg(long, env = "LOOM_REPORT_SERVER_ALLOWED_MIME_TYPES", value_delimiter = ',')]
	pub allowed_mime_types: Vec<String>,

	/// Largest accepted upload, in whole megabytes.
	#[arg(long, env = "LOOM_REPORT_SERVER_MAX_SIZE_MB", default_value_t = 2)]
	pub max_size_mb: u64,

	#[arg(long, env = "LOOM_REPORT_SERVER_LOG_LEVEL", default_value = "info")]
	pub log_level: String,

	/// SMTP relay for upload notifications. Unset disables notifications.
	#[arg(long, env = "LOOM_REPORT_SERVER_NOTIFY_SMTP_HOST")]
	pub notify_smtp_host: Option<String>,

	#[arg(long, env = "LOOM_REPORT_SERVER_NOTIFY_SMTP_PORT", default_value_t = 25)]
	pub notify_smtp_port: u16,

	#[arg(long, env = "LOOM_REPORT_SERVER_NOTIFY_FROM")]
	pub notify_from: Option<String>,

	#[arg(long, env = "LOOM_REPORT_SERVER_NOTIFY_TO", value_delimiter = ',')]
	pub notify_to: Vec<String>,

	#[arg(long, env = "LOOM_REPORT_SERVER_NOTIFY_REPLY_TO")]
	pub notify_reply_to: Option<String>,

	#[arg(
		long,
		env = "LOOM_REPORT_SERVER_NOTIFY_SUBJECT",
		default_value = "Error report received"
	)]
	pub notify_subject: String,
}

impl ServerArgs {
	pub fn policy(&self) -> Result<UploadPolicy> {
		let name_pattern = if self.name_pattern.trim().is_empty() {
			None
		} else {
			Some(Regex::new(&self.name_pattern)?)
		};

		Ok(UploadPolicy {
			allowed_addresses: self.allowed_addresses.clone(),
			name_pattern,
			allowed_extensions: normalized(&self.allowed_extensions),
			allowed_mime_types: normalized(&self.allowed_mime_types),
			max_size_mb: self.max_size_mb,
		})
	}

	/// Mail settings for notifications, validated the same way client
	/// configuration is.
	pub fn notify_config(&self) -> Result<Option<SmtpConfig>> {
		let layer = SmtpConfigLayer {
			host: self.notify_smtp_host.clone(),
			port: Some(self.notify_smtp_port),
			from: self.notify_from.clone(),
			to: (!self.notify_to.is_empty()).then(|| self.notify_to.clone()),
			reply_to: self.notify_reply_to.clone(),
			subject: Some(self.notify_subject.clone()),
			..Default::default()
		};
		Ok(layer.build()?)
	}
}

fn normalized(values: &[String]) -> Vec<String> {
	values
		.iter()
		.map(|v| v.trim().to_string())
		.filter(|v| !v.is_empty())
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(args: &[&str]) -> ServerArgs {
		let mut argv = vec!["loom-report-server"];
		argv.extend_from_slice(args);
		ServerArgs::try_parse_from(argv).unwrap()
	}

	#[test]
	fn defaults_accept_zip_up_to_two_megabytes() {
		let args = parse(&[]);
		let policy = args.policy().unwrap();

		assert_eq!(policy.allowed_extensions, vec!["zip"]);
		assert_eq!(policy.max_size_mb, 2);
		assert!(policy.allowed_addresses.is_empty());
		assert!(policy.name_pattern.is_some());
		assert!(args.notify_config().unwrap().is_none());
	}

	#[test]
	fn lists_split_on_commas() {
		let args = parse(&[
			"--allowed-addresses",
			"127.0.0.1,::1",
			"--allowed-extensions",
			"zip, txt",
		]);
		let policy = args.policy().unwrap();
		assert_eq!(policy.allowed_addresses.len(), 2);
		assert_eq!(policy.allowed_extensions, vec!["zip", "txt"]);
	}

	#[test]
	fn notification_requires_sender() {
		let args = parse(&["--notify-smtp-host", "smtp.local", "--notify-to", "ops@example.com"]);
		assert!(args.notify_config().is_err());

		let args = parse(&[
			"--notify-smtp-host",
			"smtp.local",
			"--notify-to",
			"ops@example.com",
			"--notify-from",
			"collector@example.com",
		]);
		let smtp = args.notify_config().unwrap().unwrap();
		assert_eq!(smtp.subject, "Error report received");
		assert_eq!(smtp.to, vec!["ops@example.com"]);
	}

	#[test]
	fn empty_pattern_disables_name_check() {
		let args = parse(&["--name-pattern", ""]);
		assert!(args.policy().unwrap().name_pattern.is_none());
	}
}
