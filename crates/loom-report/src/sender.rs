// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The report orchestrator: build an archive, deliver it, spool it on
//! failure and replay the spool later.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use loom_report_config::{ReportConfig, TransportSelection};
use loom_report_core::{
	begin_archive, Archive, ArchiveWriter, PendingArchive, SpoolStore, SpooledItem, Transport,
	ENVIRONMENT_ENTRY,
};
use loom_report_smtp::MailTransport;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::handler::contain;
use crate::http::HttpTransport;

/// Error type hooks may return. It is logged and otherwise ignored.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Adds entries to an outgoing archive.
///
/// Implemented for closures taking `&mut ArchiveWriter`.
pub trait ArchiveHook: Send + Sync {
	fn add_files(&self, writer: &mut ArchiveWriter) -> std::result::Result<(), HookError>;
}

impl<F> ArchiveHook for F
where
	F: Fn(&mut ArchiveWriter) -> std::result::Result<(), HookError> + Send + Sync,
{
	fn add_files(&self, writer: &mut ArchiveWriter) -> std::result::Result<(), HookError> {
		self(writer)
	}
}

/// Collator that writes the environment dump as `environment.txt`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentCollator;

impl ArchiveHook for EnvironmentCollator {
	fn add_files(&self, writer: &mut ArchiveWriter) -> std::result::Result<(), HookError> {
		writer.add_environment_info(ENVIRONMENT_ENTRY);
		Ok(())
	}
}

/// Builds, sends and spools error reports through one [`Transport`].
///
/// Only one `send`/`resend_pending` runs at a time per instance. A call made
/// while another is in flight returns `false` immediately.
pub struct LogSender {
	transport: Box<dyn Transport>,
	spool: SpoolStore,
	collator: Option<Box<dyn ArchiveHook>>,
	add_files: Vec<Box<dyn ArchiveHook>>,
	in_flight: AtomicBool,
}

impl LogSender {
	pub fn new(transport: impl Transport + 'static, spool_folder: impl Into<PathBuf>) -> Self {
		Self {
			transport: Box::new(transport),
			spool: SpoolStore::new(spool_folder),
			collator: None,
			add_files: Vec::new(),
			in_flight: AtomicBool::new(false),
		}
	}

	/// Picks HTTP or SMTP from the configuration and collates the
	/// environment dump by default.
	pub fn from_config(config: &ReportConfig) -> Result<Self> {
		let transport: Box<dyn Transport> = match config.transport()? {
			TransportSelection::Http(http) => Box::new(HttpTransport::from_config(http)?),
			TransportSelection::Smtp(smtp) => Box::new(MailTransport::new(smtp.clone())?),
		};
		info!(
			transport = transport.kind(),
			spool = %config.spool.folder.display(),
			"report sender configured"
		);
		Ok(Self::new(transport, &config.spool.folder).with_collator(EnvironmentCollator))
	}

	/// Sets the primary collation step, run before every `add_files` hook.
	pub fn with_collator(mut self, collator: impl ArchiveHook + 'static) -> Self {
		self.collator = Some(Box::new(collator));
		self
	}

	/// Registers a hook run after collation, in registration order.
	pub fn on_add_files(&mut self, hook: impl ArchiveHook + 'static) {
		self.add_files.push(Box::new(hook));
	}

	pub fn spool(&self) -> &SpoolStore {
		&self.spool
	}

	pub fn transport(&self) -> &dyn Transport {
		self.transport.as_ref()
	}

	/// Builds a report and tries to deliver it. On failure the archive is
	/// spooled and `false` is returned.
	pub fn send(&self) -> bool {
		self.exclusive("send", || self.send_locked(None))
	}

	/// As [`LogSender::send`], running `hook` after the registered hooks for
	/// this report only.
	pub fn send_with(&self, hook: &dyn ArchiveHook) -> bool {
		self.exclusive("send", || self.send_locked(Some(hook)))
	}

	/// Replays the spool first when it holds anything, then sends a new
	/// report. Returns whether the new report was delivered.
	pub fn send_with_pending(&self, hook: Option<&dyn ArchiveHook>) -> bool {
		self.exclusive("send", || {
			if self.has_unsent_files() {
				self.resend_locked();
			}
			self.send_locked(hook)
		})
	}

	/// Whether the spool holds undelivered reports.
	pub fn has_unsent_files(&self) -> bool {
		self.spool.has_pending().unwrap_or_else(|e| {
			warn!(folder = %self.spool.folder().display(), error = %e, "failed to list spool");
			false
		})
	}

	/// Redelivers spooled reports oldest first.
	///
	/// Stops at the first failure, leaving that report and every newer one
	/// in place. Returns `true` once the spool is empty and removed.
	pub fn resend_pending(&self) -> bool {
		self.exclusive("resend", || self.resend_locked())
	}

	/// Runs the collator and hooks into a fresh archive.
	///
	/// A hook that fails or panics is logged and the remaining hooks still
	/// run.
	pub fn build_archive(&self, extra: Option<&dyn ArchiveHook>) -> loom_report_core::Result<Archive> {
		let mut writer = begin_archive();

		if let Some(collator) = &self.collator {
			run_hook("collator", collator.as_ref(), &mut writer);
		}
		for hook in &self.add_files {
			run_hook("add_files", hook.as_ref(), &mut writer);
		}
		if let Some(hook) = extra {
			run_hook("send_with", hook, &mut writer);
		}

		debug!(entries = writer.entry_names().len(), "report archive collated");
		writer.finish()
	}

	fn exclusive(&self, operation: &'static str, f: impl FnOnce() -> bool) -> bool {
		if self
			.in_flight
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			warn!(operation, "a report delivery is already in progress");
			return false;
		}

		struct Release<'a>(&'a AtomicBool);
		impl Drop for Release<'_> {
			fn drop(&mut self) {
				self.0.store(false, Ordering::Release);
			}
		}
		let _release = Release(&self.in_flight);

		f()
	}

	fn send_locked(&self, extra: Option<&dyn ArchiveHook>) -> bool {
		let archive = match self.build_archive(extra) {
			Ok(archive) => archive,
			Err(e) => {
				error!(error = %e, "failed to build report archive");
				return false;
			}
		};

		let result = self.transport.send(&archive);
		if result.is_success() {
			info!(transport = self.transport.kind(), bytes = archive.len(), "report delivered");
			return true;
		}

		warn!(
			transport = self.transport.kind(),
			reason = result.message.as_deref().unwrap_or("unknown"),
			"report delivery failed, spooling"
		);
		if let Err(e) = self.spool.save(&archive) {
			error!(error = %e, "failed to spool report, it is lost");
		}
		false
	}

	fn resend_locked(&self) -> bool {
		let items = match self.spool.list_pending() {
			Ok(items) => items,
			Err(e) => {
				warn!(error = %e, "failed to list spooled reports");
				return false;
			}
		};
		if items.is_empty() {
			return true;
		}

		let (pending, complete) = read_pending(&items);
		if pending.is_empty() {
			return false;
		}
		let delivered = if let Some(result) = self.transport.send_batch(&pending) {
			if result.is_success() {
				self.delete_all(&items[..pending.len()])
			} else {
				warn!(
					count = pending.len(),
					reason = result.message.as_deref().unwrap_or("unknown"),
					"batch resend failed"
				);
				false
			}
		} else {
			self.resend_each(&items, &pending)
		};

		if !(delivered && complete) {
			return false;
		}

		match self.spool.delete_folder_if_empty() {
			Ok(removed) => {
				info!(count = items.len(), "sent all spooled reports");
				removed
			}
			Err(e) => {
				warn!(error = %e, "failed to remove spool folder");
				false
			}
		}
	}

	fn resend_each(&self, items: &[SpooledItem], pending: &[PendingArchive]) -> bool {
		for (item, pending) in items.iter().zip(pending) {
			info!(file = %pending.file_name, "resending spooled report");
			let result = self.transport.send(&pending.archive);
			if !result.is_success() {
				warn!(
					file = %pending.file_name,
					reason = result.message.as_deref().unwrap_or("unknown"),
					"resend failed, keeping remaining reports spooled"
				);
				return false;
			}
			if let Err(e) = self.spool.delete(item) {
				warn!(file = %pending.file_name, error = %e, "failed to delete resent report");
				return false;
			}
		}
		true
	}

	fn delete_all(&self, items: &[SpooledItem]) -> bool {
		for item in items {
			if let Err(e) = self.spool.delete(item) {
				warn!(path = %item.path().display(), error = %e, "failed to delete resent report");
				return false;
			}
		}
		true
	}
}

fn run_hook(stage: &'static str, hook: &dyn ArchiveHook, writer: &mut ArchiveWriter) {
	match contain(|| hook.add_files(writer)) {
		Ok(Ok(())) => {}
		Ok(Err(e)) => warn!(stage, error = %e, "report hook failed, continuing"),
		Err(panic) => warn!(stage, panic = %panic, "report hook panicked, continuing"),
	}
}

/// Loads spooled archives in order, stopping at the first unreadable one.
/// The flag is `false` when not every item could be read.
fn read_pending(items: &[SpooledItem]) -> (Vec<PendingArchive>, bool) {
	let mut pending = Vec::with_capacity(items.len());
	for item in items {
		match item.read() {
			Ok(archive) => pending.push(PendingArchive {
				file_name: item.file_name(),
				archive,
			}),
			Err(e) => {
				warn!(path = %item.path().display(), error = %e, "failed to read spooled report");
				return (pending, false);
			}
		}
	}
	(pending, true)
}
