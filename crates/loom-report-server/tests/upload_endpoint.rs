// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::net::SocketAddr;
use std::path::Path;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use loom_report::http::{multipart_body, new_boundary};
use loom_report::{LogFile, LogFileOptions, MailTransport};
use loom_report_config::{SmtpConfigLayer, TlsMode};
use loom_report_server::{create_router, AppState, UploadPolicy};
use regex::Regex;
use tempfile::TempDir;
use tower::ServiceExt;

fn client() -> SocketAddr {
	"192.168.1.20:50000".parse().unwrap()
}

fn policy() -> UploadPolicy {
	UploadPolicy {
		allowed_addresses: Vec::new(),
		name_pattern: Some(Regex::new(r"(\w+\.)\w+").unwrap()),
		allowed_extensions: vec!["zip".into()],
		allowed_mime_types: Vec::new(),
		max_size_mb: 2,
	}
}

fn app(state: AppState) -> Router {
	create_router(state, "/upload").layer(MockConnectInfo(client()))
}

fn upload(file_name: &str, bytes: &[u8]) -> Request<Body> {
	let boundary = new_boundary();
	multipart_request(&boundary, multipart_body(&boundary, file_name, bytes))
}

fn multipart_request(boundary: &str, body: Vec<u8>) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri("/upload")
		.header(
			header::CONTENT_TYPE,
			format!("multipart/form-data; boundary={boundary}"),
		)
		.body(Body::from(body))
		.unwrap()
}

fn stored_files(dir: &Path) -> Vec<String> {
	match std::fs::read_dir(dir) {
		Ok(entries) => entries
			.map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
			.collect(),
		Err(_) => Vec::new(),
	}
}

#[tokio::test]
async fn accepted_upload_is_stored_and_logged() {
	let dir = TempDir::new().unwrap();
	let uploads = dir.path().join("uploads");
	let log_path = dir.path().join("activity.log");
	let activity = LogFile::open(&log_path, LogFileOptions::default()).unwrap();
	let state = AppState::new(policy(), &uploads, None, Some(activity));

	let response = app(state.clone())
		.oneshot(upload("Report.zip", b"PK\x03\x04 report"))
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::OK);

	let files = stored_files(&uploads);
	assert_eq!(files.len(), 1);
	assert!(files[0].ends_with("_192.168.1.20_1.zip"), "{}", files[0]);
	assert_eq!(
		std::fs::read(uploads.join(&files[0])).unwrap(),
		b"PK\x03\x04 report"
	);

	drop(state);
	let log = std::fs::read_to_string(&log_path).unwrap();
	assert!(log.contains(&format!("Successfully uploaded {}", files[0])), "{log}");
	assert!(log.contains("192.168.1.20"));
}

#[tokio::test]
async fn second_upload_in_same_second_gets_next_number() {
	let dir = TempDir::new().unwrap();
	let state = AppState::new(policy(), dir.path(), None, None);

	for _ in 0..2 {
		let response = app(state.clone())
			.oneshot(upload("Report.zip", b"zip"))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
	}

	assert_eq!(stored_files(dir.path()).len(), 2);
}

#[tokio::test]
async fn wrong_extension_is_refused() {
	let dir = TempDir::new().unwrap();
	let log_path = dir.path().join("activity.log");
	let activity = LogFile::open(&log_path, LogFileOptions::default()).unwrap();
	let uploads = dir.path().join("uploads");
	let state = AppState::new(policy(), &uploads, None, Some(activity));

	let response = app(state.clone())
		.oneshot(upload("Report.exe", b"MZ"))
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	assert!(stored_files(&uploads).is_empty());

	drop(state);
	let log = std::fs::read_to_string(&log_path).unwrap();
	assert!(log.contains("Extension 'exe' not acceptable (File Report.exe)"), "{log}");
}

#[tokio::test]
async fn unknown_address_is_refused() {
	let dir = TempDir::new().unwrap();
	let mut strict = policy();
	strict.allowed_addresses = vec!["10.0.0.1".parse().unwrap()];
	let state = AppState::new(strict, dir.path(), None, None);

	let response = app(state).oneshot(upload("Report.zip", b"zip")).await.unwrap();

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	assert!(stored_files(dir.path()).is_empty());
}

#[tokio::test]
async fn request_without_file_part_is_refused() {
	let dir = TempDir::new().unwrap();
	let state = AppState::new(policy(), dir.path(), None, None);

	let boundary = new_boundary();
	let body = format!(
		"--{boundary}\r\n\
		 Content-Disposition: form-data; name=\"comment\"\r\n\r\n\
		 hello\r\n\
		 --{boundary}--\r\n"
	);
	let response = app(state)
		.oneshot(multipart_request(&boundary, body.into_bytes()))
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	assert!(stored_files(dir.path()).is_empty());
}

#[tokio::test]
async fn mime_type_outside_allow_list_is_refused() {
	let dir = TempDir::new().unwrap();
	let mut strict = policy();
	strict.allowed_mime_types = vec!["application/zip".into()];
	let state = AppState::new(strict, dir.path(), None, None);

	let response = app(state).oneshot(upload("Report.zip", b"zip")).await.unwrap();

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_notification_still_accepts_upload() {
	let dir = TempDir::new().unwrap();
	let log_path = dir.path().join("activity.log");
	let activity = LogFile::open(&log_path, LogFileOptions::default()).unwrap();
	let smtp = SmtpConfigLayer {
		host: Some("127.0.0.1".into()),
		port: Some(1),
		tls: Some(TlsMode::None),
		from: Some("collector@example.com".into()),
		to: Some(vec!["ops@example.com".into()]),
		timeout_secs: Some(2),
		..Default::default()
	}
	.build()
	.unwrap()
	.unwrap();
	let notifier = MailTransport::new(smtp).unwrap();
	let uploads = dir.path().join("uploads");
	let state = AppState::new(policy(), &uploads, Some(notifier), Some(activity));

	let response = app(state.clone())
		.oneshot(upload("Report.zip", b"zip"))
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(stored_files(&uploads).len(), 1);

	drop(state);
	let log = std::fs::read_to_string(&log_path).unwrap();
	assert!(log.contains("Couldn't send mail"), "{log}");
}
