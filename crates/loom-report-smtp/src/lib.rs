// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SMTP transport for Loom error reports.
//!
//! [`MailTransport`] mails each report archive as an attachment using the
//! blocking [`lettre`] client. Spooled archives are resent together: every
//! pending file is attached to one message.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use loom_report_config::{SmtpConfig, TlsMode};
//! use loom_report_core::{begin_archive, Transport};
//! use loom_report_smtp::MailTransport;
//!
//! let config = SmtpConfig {
//!     host: "smtp.example.com".to_string(),
//!     port: 587,
//!     username: None,
//!     password: None,
//!     use_default_credentials: false,
//!     tls: TlsMode::StartTls,
//!     from: "app@example.com".to_string(),
//!     to: vec!["support@example.com".to_string()],
//!     reply_to: None,
//!     subject: "Error report".to_string(),
//!     body: "Log Files are attached".to_string(),
//!     attachment_name: "Report.zip".to_string(),
//!     timeout: Duration::from_secs(30),
//! };
//!
//! let transport = MailTransport::new(config).unwrap();
//! let archive = begin_archive().finish().unwrap();
//! let result = transport.send(&archive);
//! println!("delivered: {}", result.is_success());
//! ```

mod credentials;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport as _};
use loom_report_config::{SmtpConfig, TlsMode};
use loom_report_core::{Archive, PendingArchive, Transport, TransportResult};
use tracing::{debug, info, warn};

pub use credentials::MailCredentials;

const ZIP_CONTENT_TYPE: &str = "application/x-zip-compressed";

/// Errors raised while building or sending a report mail.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
	#[error("invalid email address: {0}")]
	Address(String),

	#[error("failed to build message: {0}")]
	Build(String),

	#[error("connection failed: {0}")]
	Connection(String),

	#[error("send failed: {0}")]
	Send(String),
}

/// One file attached to a report mail.
#[derive(Debug, Clone, Copy)]
pub struct MailAttachment<'a> {
	pub file_name: &'a str,
	pub bytes: &'a [u8],
}

/// Mails report archives through an SMTP relay.
pub struct MailTransport {
	config: SmtpConfig,
	from: Mailbox,
	to: Vec<Mailbox>,
	reply_to: Option<Mailbox>,
	credentials: MailCredentials,
}

impl MailTransport {
	/// Validates every address up front; nothing connects until a send.
	#[tracing::instrument(
		name = "mail_transport_new",
		skip(config),
		fields(host = %config.host, port = config.port, tls = ?config.tls)
	)]
	pub fn new(config: SmtpConfig) -> Result<Self, MailError> {
		let from = parse_mailbox(&config.from)?;
		let to = config
			.to
			.iter()
			.map(|addr| parse_mailbox(addr))
			.collect::<Result<Vec<_>, _>>()?;
		if to.is_empty() {
			return Err(MailError::Address("no recipients".to_string()));
		}
		let reply_to = config.reply_to.as_deref().map(parse_mailbox).transpose()?;
		let credentials = MailCredentials::from_config(&config);

		Ok(Self {
			config,
			from,
			to,
			reply_to,
			credentials,
		})
	}

	pub fn config(&self) -> &SmtpConfig {
		&self.config
	}

	/// Sends one message carrying the configured body and `attachments`.
	#[tracing::instrument(
		name = "mail_send_files",
		skip(self, body, attachments),
		fields(host = %self.config.host, attachments = attachments.len())
	)]
	pub fn send_files(
		&self,
		subject: &str,
		body: &str,
		attachments: &[MailAttachment<'_>],
	) -> Result<(), MailError> {
		let message = self.build_message(subject, body, attachments)?;
		let transport = self.transport()?;

		debug!("sending report mail");
		transport
			.send(&message)
			.map_err(|e| MailError::Send(e.to_string()))?;

		info!("report mail sent");
		Ok(())
	}

	fn build_message(
		&self,
		subject: &str,
		body: &str,
		attachments: &[MailAttachment<'_>],
	) -> Result<Message, MailError> {
		let mut builder = Message::builder().from(self.from.clone()).subject(subject);
		for to in &self.to {
			builder = builder.to(to.clone());
		}
		if let Some(reply_to) = &self.reply_to {
			builder = builder.reply_to(reply_to.clone());
		}

		let content_type =
			ContentType::parse(ZIP_CONTENT_TYPE).map_err(|e| MailError::Build(e.to_string()))?;

		let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(body.to_string()));
		for attachment in attachments {
			parts = parts.singlepart(
				Attachment::new(attachment.file_name.to_string())
					.body(attachment.bytes.to_vec(), content_type.clone()),
			);
		}

		builder
			.multipart(parts)
			.map_err(|e| MailError::Build(e.to_string()))
	}

	fn transport(&self) -> Result<SmtpTransport, MailError> {
		let host = self.config.host.as_str();
		let builder = match self.config.tls {
			TlsMode::None => SmtpTransport::builder_dangerous(host),
			TlsMode::StartTls => {
				SmtpTransport::starttls_relay(host).map_err(|e| MailError::Connection(e.to_string()))?
			}
			TlsMode::Tls => {
				SmtpTransport::relay(host).map_err(|e| MailError::Connection(e.to_string()))?
			}
		};

		let mut builder = builder
			.port(self.config.port)
			.timeout(Some(self.config.timeout));

		if let Some((username, password)) = self.credentials.resolve() {
			builder = builder.credentials(Credentials::new(username, password));
		}

		Ok(builder.build())
	}

	fn deliver(&self, attachments: &[MailAttachment<'_>]) -> TransportResult {
		match self.send_files(&self.config.subject, &self.config.body, attachments) {
			Ok(()) => TransportResult::ok(),
			Err(e) => {
				warn!(host = %self.config.host, error = %e, "report mail failed");
				TransportResult::failed(e.to_string())
			}
		}
	}
}

impl Transport for MailTransport {
	fn kind(&self) -> &'static str {
		"smtp"
	}

	fn send(&self, archive: &Archive) -> TransportResult {
		self.deliver(&[MailAttachment {
			file_name: &self.config.attachment_name,
			bytes: archive.as_bytes(),
		}])
	}

	fn send_batch(&self, pending: &[PendingArchive]) -> Option<TransportResult> {
		let attachments: Vec<_> = pending
			.iter()
			.map(|p| MailAttachment {
				file_name: &p.file_name,
				bytes: p.archive.as_bytes(),
			})
			.collect();
		Some(self.deliver(&attachments))
	}
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
	address
		.trim()
		.parse()
		.map_err(|e| MailError::Address(format!("'{address}': {e}")))
}

/// Whether `address` parses as a mailbox, e.g. `user@example.com` or
/// `Support <support@example.com>`.
pub fn is_valid_address(address: &str) -> bool {
	address.parse::<Mailbox>().is_ok()
}
