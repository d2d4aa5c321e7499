// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The upload endpoint: validate one multipart `file` part, store it under
//! a unique name and optionally mail it on.
//!
//! Every rejection is answered with `500 Internal Server Error`; clients
//! treat anything but `200 OK` as a failed delivery and spool the report.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use axum::extract::{ConnectInfo, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use loom_report_smtp::MailAttachment;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, instrument, warn};

use crate::state::AppState;

const STORED_NAME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";
const BYTES_PER_MB: u64 = 1024 * 1024;

/// What an upload must satisfy to be stored. Empty lists disable their check.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
	pub allowed_addresses: Vec<IpAddr>,
	pub name_pattern: Option<Regex>,
	pub allowed_extensions: Vec<String>,
	pub allowed_mime_types: Vec<String>,
	pub max_size_mb: u64,
}

impl UploadPolicy {
	pub fn check_address(&self, ip: IpAddr) -> Result<(), String> {
		if self.allowed_addresses.is_empty() || self.allowed_addresses.contains(&ip) {
			Ok(())
		} else {
			Err("Security error, unexpected IP address".to_string())
		}
	}

	pub fn check_file(&self, file: &ReceivedFile) -> Result<(), String> {
		let name = &file.file_name;

		if let Some(pattern) = &self.name_pattern {
			if !pattern.is_match(name) {
				return Err(format!("Filename '{name}' did not validate"));
			}
		}

		let extension = file.extension();
		if !self.allowed_extensions.is_empty() && !self.allowed_extensions.iter().any(|e| e == extension) {
			return Err(format!("Extension '{extension}' not acceptable (File {name})"));
		}

		let mime = file.content_type.as_deref().unwrap_or_default();
		if !self.allowed_mime_types.is_empty() && !self.allowed_mime_types.iter().any(|m| m == mime) {
			return Err(format!("Mime type '{mime}' not acceptable (File {name})"));
		}

		let size_mb = file.bytes.len() as u64 / BYTES_PER_MB;
		if size_mb > self.max_size_mb {
			return Err(format!(
				"File is too large: {size_mb}MB > {}MB (File {name})",
				self.max_size_mb
			));
		}

		Ok(())
	}

	/// Request body limit: the file plus a megabyte of multipart framing.
	pub fn body_limit(&self) -> usize {
		usize::try_from((self.max_size_mb + 1).saturating_mul(BYTES_PER_MB)).unwrap_or(usize::MAX)
	}
}

#[derive(Debug, Clone)]
pub struct ReceivedFile {
	pub file_name: String,
	pub content_type: Option<String>,
	pub bytes: Vec<u8>,
}

impl ReceivedFile {
	/// Text after the last `.`, or the whole name when there is none.
	pub fn extension(&self) -> &str {
		self.file_name.rsplit('.').next().unwrap_or_default()
	}
}

/// A refused upload. Logged when created, answered with a bare 500.
#[derive(Debug)]
pub struct Rejected;

impl IntoResponse for Rejected {
	fn into_response(self) -> Response {
		StatusCode::INTERNAL_SERVER_ERROR.into_response()
	}
}

#[instrument(name = "receive_upload", skip(state, multipart), fields(client = %addr.ip()))]
pub async fn receive_upload(
	State(state): State<AppState>,
	ConnectInfo(addr): ConnectInfo<SocketAddr>,
	mut multipart: Multipart,
) -> Result<StatusCode, Rejected> {
	let ip = addr.ip();
	let policy = state.policy();

	policy.check_address(ip).map_err(|reason| state.reject(ip, &reason))?;

	let file = match read_file_part(&mut multipart).await {
		Ok(Some(file)) => file,
		Ok(None) => return Err(state.reject(ip, "No file uploaded")),
		Err(reason) => return Err(state.reject(ip, &reason)),
	};
	policy.check_file(&file).map_err(|reason| state.reject(ip, &reason))?;

	let stored = store(state.upload_dir(), Utc::now(), ip, &file).await.map_err(|e| {
		error!(error = %e, "failed to store upload");
		state.reject(ip, "Failed to write file to disk")
	})?;
	let stored_name = stored
		.file_name()
		.map(|n| n.to_string_lossy().into_owned())
		.unwrap_or_default();

	state.activity(ip, &format!("Successfully uploaded {stored_name}"));
	info!(file = %stored_name, bytes = file.bytes.len(), "report stored");

	if let Some(notifier) = state.notifier() {
		let bytes = file.bytes;
		let subject = notifier.config().subject.clone();
		let body = format!("Error report {stored_name} received from {ip}");
		let result = tokio::task::spawn_blocking(move || {
			notifier.send_files(
				&subject,
				&body,
				&[MailAttachment {
					file_name: &stored_name,
					bytes: &bytes,
				}],
			)
		})
		.await;

		match result {
			Ok(Ok(())) => {}
			Ok(Err(e)) => {
				warn!(error = %e, "failed to send upload notification");
				state.activity(ip, "Couldn't send mail");
			}
			Err(e) => warn!(error = %e, "notification task failed"),
		}
	}

	Ok(StatusCode::OK)
}

async fn read_file_part(multipart: &mut Multipart) -> Result<Option<ReceivedFile>, String> {
	while let Some(field) = multipart
		.next_field()
		.await
		.map_err(|e| format!("Upload error: {e}"))?
	{
		if field.name() != Some("file") {
			continue;
		}

		let file_name = field.file_name().unwrap_or_default().to_string();
		let content_type = field.content_type().map(str::to_string);
		let bytes = field
			.bytes()
			.await
			.map_err(|e| format!("The uploaded file was only partially uploaded: {e}"))?;

		return Ok(Some(ReceivedFile {
			file_name,
			content_type,
			bytes: bytes.to_vec(),
		}));
	}
	Ok(None)
}

/// `<yyyy-MM-dd-HH-mm-ss>_<ip>_<n>.<ext>`, with `:` in the address
/// replaced by `-`.
pub fn stored_name(at: DateTime<Utc>, ip: IpAddr, n: u32, extension: &str) -> String {
	format!(
		"{}_{}_{n}.{extension}",
		at.format(STORED_NAME_FORMAT),
		ip.to_string().replace(':', "-")
	)
}

/// Writes the upload under the first free name, counting `n` up from 1.
pub async fn store(dir: &Path, at: DateTime<Utc>, ip: IpAddr, file: &ReceivedFile) -> io::Result<PathBuf> {
	tokio::fs::create_dir_all(dir).await?;

	let mut n = 1;
	loop {
		let path = dir.join(stored_name(at, ip, n, file.extension()));
		match tokio::fs::OpenOptions::new()
			.write(true)
			.create_new(true)
			.open(&path)
			.await
		{
			Ok(mut out) => {
				out.write_all(&file.bytes).await?;
				out.flush().await?;
				return Ok(path);
			}
			Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
			Err(e) => return Err(e),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use tempfile::TempDir;

	fn policy() -> UploadPolicy {
		UploadPolicy {
			allowed_addresses: Vec::new(),
			name_pattern: Some(Regex::new(r"(\w+\.)\w+").unwrap()),
			allowed_extensions: vec!["zip".into()],
			allowed_mime_types: Vec::new(),
			max_size_mb: 2,
		}
	}

	fn file(name: &str, len: usize) -> ReceivedFile {
		ReceivedFile {
			file_name: name.into(),
			content_type: Some("application/x-zip-compressed".into()),
			bytes: vec![0; len],
		}
	}

	#[test]
	fn accepts_zip_within_limit() {
		assert!(policy().check_file(&file("Report.zip", 1024)).is_ok());
	}

	#[test]
	fn rejects_bad_name_and_extension() {
		let err = policy().check_file(&file("noextension", 10)).unwrap_err();
		assert_eq!(err, "Filename 'noextension' did not validate");

		let err = policy().check_file(&file("Report.exe", 10)).unwrap_err();
		assert_eq!(err, "Extension 'exe' not acceptable (File Report.exe)");
	}

	#[test]
	fn size_is_compared_in_whole_megabytes() {
		let limit = policy();
		let just_under_three = (3 * BYTES_PER_MB - 1) as usize;
		assert!(limit.check_file(&file("Report.zip", just_under_three)).is_ok());

		let err = limit.check_file(&file("Report.zip", (3 * BYTES_PER_MB) as usize)).unwrap_err();
		assert!(err.starts_with("File is too large: 3MB > 2MB"), "{err}");
	}

	#[test]
	fn mime_allow_list() {
		let mut strict = policy();
		strict.allowed_mime_types = vec!["application/zip".into()];
		let err = strict.check_file(&file("Report.zip", 10)).unwrap_err();
		assert!(err.starts_with("Mime type 'application/x-zip-compressed'"));
	}

	#[test]
	fn address_allow_list() {
		let mut strict = policy();
		strict.allowed_addresses = vec!["10.0.0.1".parse().unwrap()];
		assert!(strict.check_address("10.0.0.1".parse().unwrap()).is_ok());
		assert!(strict.check_address("10.0.0.2".parse().unwrap()).is_err());
		assert!(policy().check_address("10.0.0.2".parse().unwrap()).is_ok());
	}

	#[test]
	fn stored_names_replace_ipv6_colons() {
		let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
		assert_eq!(
			stored_name(at, "192.168.1.20".parse().unwrap(), 1, "zip"),
			"2024-03-09-14-05-07_192.168.1.20_1.zip"
		);
		assert_eq!(
			stored_name(at, "::1".parse().unwrap(), 2, "zip"),
			"2024-03-09-14-05-07_--1_2.zip"
		);
	}

	#[tokio::test]
	async fn store_counts_up_to_free_name() {
		let dir = TempDir::new().unwrap();
		let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
		let ip: IpAddr = "127.0.0.1".parse().unwrap();
		let upload = file("Report.zip", 4);

		let first = store(dir.path(), at, ip, &upload).await.unwrap();
		let second = store(dir.path(), at, ip, &upload).await.unwrap();

		assert!(first.ends_with("2024-03-09-14-05-07_127.0.0.1_1.zip"));
		assert!(second.ends_with("2024-03-09-14-05-07_127.0.0.1_2.zip"));
		assert_eq!(std::fs::read(second).unwrap(), vec![0; 4]);
	}
}
