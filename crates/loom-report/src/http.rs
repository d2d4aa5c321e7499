// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP upload transport.
//!
//! Each archive is POSTed as a single `multipart/form-data` part named
//! `file`. The collector must answer `200 OK`; any other status, and any
//! network error, counts as a failed delivery.

use std::time::Duration;

use loom_report_config::HttpConfig;
use loom_report_core::{Archive, Transport, TransportResult};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;

/// File name announced in the upload. Collectors rename uploads on arrival.
pub const UPLOAD_FILE_NAME: &str = "Report.zip";

pub const ZIP_CONTENT_TYPE: &str = "application/x-zip-compressed";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Uploads report archives to a web collector.
pub struct HttpTransport {
	url: String,
	client: Client,
}

impl HttpTransport {
	pub fn new(url: impl Into<String>) -> Result<Self> {
		Self::with_options(url, DEFAULT_TIMEOUT, None)
	}

	pub fn from_config(config: &HttpConfig) -> Result<Self> {
		Self::with_options(config.url.clone(), config.timeout, config.user_agent.as_deref())
	}

	pub fn with_options(
		url: impl Into<String>,
		timeout: Duration,
		user_agent: Option<&str>,
	) -> Result<Self> {
		let user_agent = user_agent
			.map(str::to_string)
			.unwrap_or_else(|| format!("loom-report/{}", env!("CARGO_PKG_VERSION")));

		let client = Client::builder()
			.timeout(timeout)
			.user_agent(user_agent)
			.build()?;

		Ok(Self {
			url: url.into(),
			client,
		})
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	fn upload(&self, archive: &Archive) -> std::result::Result<StatusCode, reqwest::Error> {
		let boundary = new_boundary();
		let body = multipart_body(&boundary, UPLOAD_FILE_NAME, archive.as_bytes());

		let response = self
			.client
			.post(&self.url)
			.header(
				reqwest::header::CONTENT_TYPE,
				format!("multipart/form-data; boundary={boundary}"),
			)
			.body(body)
			.send()?;

		Ok(response.status())
	}
}

impl Transport for HttpTransport {
	fn kind(&self) -> &'static str {
		"http"
	}

	#[tracing::instrument(name = "http_send", skip(self, archive), fields(url = %self.url, bytes = archive.len()))]
	fn send(&self, archive: &Archive) -> TransportResult {
		match self.upload(archive) {
			Ok(StatusCode::OK) => {
				debug!("report uploaded");
				TransportResult::ok()
			}
			Ok(status) => {
				warn!(status = status.as_u16(), "collector rejected report");
				TransportResult::failed(format!("collector returned {status}"))
			}
			Err(e) => {
				warn!(error = %e, "report upload failed");
				TransportResult::failed(e.to_string())
			}
		}
	}
}

/// A fresh `----------<uuid>` boundary.
pub fn new_boundary() -> String {
	format!("----------{}", Uuid::new_v4())
}

/// Frames `bytes` as the only part of a `multipart/form-data` body.
pub fn multipart_body(boundary: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
	let head = format!(
		"--{boundary}\r\n\
		 Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
		 Content-Type: {ZIP_CONTENT_TYPE}\r\n\r\n"
	);
	let tail = format!("\r\n--{boundary}--\r\n");

	let mut body = Vec::with_capacity(head.len() + bytes.len() + tail.len());
	body.extend_from_slice(head.as_bytes());
	body.extend_from_slice(bytes);
	body.extend_from_slice(tail.as_bytes());
	body
}
