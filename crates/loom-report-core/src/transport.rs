// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The delivery contract shared by every transport.

use crate::archive::Archive;

/// Outcome of one delivery attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResult {
	pub success: bool,
	pub message: Option<String>,
}

impl TransportResult {
	pub fn ok() -> Self {
		Self {
			success: true,
			message: None,
		}
	}

	pub fn failed(message: impl Into<String>) -> Self {
		Self {
			success: false,
			message: Some(message.into()),
		}
	}

	pub fn is_success(&self) -> bool {
		self.success
	}
}

/// A spooled archive loaded back for redelivery, with the file name it was
/// stored under.
#[derive(Debug)]
pub struct PendingArchive {
	pub file_name: String,
	pub archive: Archive,
}

/// Delivers archives to a remote collector.
///
/// Implementations report failure through [`TransportResult`] and never
/// panic or return errors for network or protocol problems.
pub trait Transport: Send + Sync {
	/// Short name used in log fields, e.g. `"http"` or `"smtp"`.
	fn kind(&self) -> &'static str;

	fn send(&self, archive: &Archive) -> TransportResult;

	/// Delivers several spooled archives in one attempt.
	///
	/// Returns `None` when the transport has no batch mode, in which case the
	/// caller falls back to sending them one at a time.
	fn send_batch(&self, _pending: &[PendingArchive]) -> Option<TransportResult> {
		None
	}
}

impl<T: Transport + ?Sized> Transport for Box<T> {
	fn kind(&self) -> &'static str {
		(**self).kind()
	}

	fn send(&self, archive: &Archive) -> TransportResult {
		(**self).send(archive)
	}

	fn send_batch(&self, pending: &[PendingArchive]) -> Option<TransportResult> {
		(**self).send_batch(pending)
	}
}
