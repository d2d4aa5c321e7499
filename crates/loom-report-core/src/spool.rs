// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Filesystem queue of archives whose delivery failed.
//!
//! The spool is a flat directory holding one `yyyy-MM-dd-HH-mm-ss.zip` per
//! failed attempt. File names are UTC timestamps, so lexicographic order is
//! chronological order.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, info};

use crate::archive::Archive;
use crate::error::{ReportError, Result};

/// `chrono` format of a spool file stem.
pub const SPOOL_NAME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

const SPOOL_EXTENSION: &str = "zip";

/// One archive persisted in the spool folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpooledItem {
	path: PathBuf,
}

impl SpooledItem {
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// File name within the spool folder, e.g. `2025-01-31-23-59-59.zip`.
	pub fn file_name(&self) -> String {
		self
			.path
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_default()
	}

	/// The UTC time encoded in the file name, if it follows the spool pattern.
	pub fn timestamp(&self) -> Option<DateTime<Utc>> {
		let stem = self.path.file_stem()?.to_str()?;
		NaiveDateTime::parse_from_str(stem, SPOOL_NAME_FORMAT)
			.ok()
			.map(|naive| naive.and_utc())
	}

	/// Reads the archive back into memory.
	pub fn read(&self) -> Result<Archive> {
		Ok(Archive::from_bytes(std::fs::read(&self.path)?))
	}
}

/// The spool folder for one sender.
#[derive(Debug, Clone)]
pub struct SpoolStore {
	folder: PathBuf,
}

impl SpoolStore {
	pub fn new(folder: impl Into<PathBuf>) -> Self {
		Self {
			folder: folder.into(),
		}
	}

	pub fn folder(&self) -> &Path {
		&self.folder
	}

	/// Pending archives, oldest first. An absent folder yields an empty list.
	pub fn list_pending(&self) -> Result<Vec<SpooledItem>> {
		let entries = match std::fs::read_dir(&self.folder) {
			Ok(entries) => entries,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(e.into()),
		};

		let mut items = Vec::new();
		for entry in entries {
			let entry = entry?;
			let path = entry.path();
			if !entry.file_type()?.is_file() {
				continue;
			}
			if path.extension().and_then(|e| e.to_str()) != Some(SPOOL_EXTENSION) {
				continue;
			}
			items.push(SpooledItem { path });
		}

		items.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
		Ok(items)
	}

	pub fn has_pending(&self) -> Result<bool> {
		Ok(!self.list_pending()?.is_empty())
	}

	/// Persists `archive` under the current UTC time.
	pub fn save(&self, archive: &Archive) -> Result<SpooledItem> {
		self.save_at(archive, Utc::now())
	}

	/// Persists `archive` under the given time.
	///
	/// Never overwrites: a second save within the same second fails with
	/// [`ReportError::SpoolCollision`].
	pub fn save_at(&self, archive: &Archive, at: DateTime<Utc>) -> Result<SpooledItem> {
		std::fs::create_dir_all(&self.folder)?;

		let name = format!("{}.{SPOOL_EXTENSION}", at.format(SPOOL_NAME_FORMAT));
		let path = self.folder.join(name);

		let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
			Ok(file) => file,
			Err(e) if e.kind() == ErrorKind::AlreadyExists => {
				return Err(ReportError::SpoolCollision(path));
			}
			Err(e) => return Err(e.into()),
		};
		file.write_all(archive.as_bytes())?;
		file.sync_all()?;

		info!(path = %path.display(), bytes = archive.len(), "spooled undelivered report");
		Ok(SpooledItem { path })
	}

	pub fn delete(&self, item: &SpooledItem) -> Result<()> {
		std::fs::remove_file(&item.path)?;
		debug!(path = %item.path.display(), "deleted spooled report");
		Ok(())
	}

	/// Removes the spool folder if nothing is left in it.
	///
	/// Returns `true` if the folder no longer exists afterwards.
	pub fn delete_folder_if_empty(&self) -> Result<bool> {
		let mut entries = match std::fs::read_dir(&self.folder) {
			Ok(entries) => entries,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
			Err(e) => return Err(e.into()),
		};
		if entries.next().is_some() {
			return Ok(false);
		}
		std::fs::remove_dir(&self.folder)?;
		debug!(folder = %self.folder.display(), "removed empty spool folder");
		Ok(true)
	}
}
