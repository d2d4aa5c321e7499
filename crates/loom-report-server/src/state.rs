// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use loom_report::LogFile;
use loom_report_smtp::MailTransport;
use tracing::warn;

use crate::config::ServerArgs;
use crate::error::Result;
use crate::upload::{Rejected, UploadPolicy};

#[derive(Clone)]
pub struct AppState {
	inner: Arc<Inner>,
}

struct Inner {
	policy: UploadPolicy,
	upload_dir: PathBuf,
	notifier: Option<Arc<MailTransport>>,
	activity: Option<LogFile>,
}

impl AppState {
	pub fn new(
		policy: UploadPolicy,
		upload_dir: impl Into<PathBuf>,
		notifier: Option<MailTransport>,
		activity: Option<LogFile>,
	) -> Self {
		Self {
			inner: Arc::new(Inner {
				policy,
				upload_dir: upload_dir.into(),
				notifier: notifier.map(Arc::new),
				activity,
			}),
		}
	}

	pub fn from_args(args: &ServerArgs) -> Result<Self> {
		let notifier = args.notify_config()?.map(MailTransport::new).transpose()?;
		let activity = args
			.activity_log
			.as_ref()
			.map(|path| LogFile::open(path.clone(), Default::default()))
			.transpose()?;
		Ok(Self::new(args.policy()?, &args.upload_dir, notifier, activity))
	}

	pub fn policy(&self) -> &UploadPolicy {
		&self.inner.policy
	}

	pub fn upload_dir(&self) -> &Path {
		&self.inner.upload_dir
	}

	pub fn notifier(&self) -> Option<Arc<MailTransport>> {
		self.inner.notifier.clone()
	}

	/// Appends `<message> - <time> - <client>` to the activity log.
	pub fn activity(&self, ip: IpAddr, message: &str) {
		if let Some(log) = &self.inner.activity {
			log.write_line(&format!("{message} - {} - {ip}", Utc::now().to_rfc2822()));
		}
	}

	pub(crate) fn reject(&self, ip: IpAddr, reason: &str) -> Rejected {
		warn!(client = %ip, reason, "upload rejected");
		self.activity(ip, reason);
		Rejected
	}
}
