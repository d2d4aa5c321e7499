// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory zip archives assembled from named diagnostic sources.
//!
//! An [`ArchiveWriter`] buffers entries into a zip held in memory. Adding an
//! entry never aborts the archive: a source that fails to read is logged and
//! skipped so the rest of the report still gets packaged.

use std::collections::HashSet;
use std::fmt;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::environment::EnvironmentInfo;
use crate::error::{ReportError, Result};

/// Default entry name for the environment dump.
pub const ENVIRONMENT_ENTRY: &str = "environment.txt";

/// Default entry name for a screenshot.
pub const SCREENSHOT_ENTRY: &str = "screenshot.png";

/// A finished zip archive.
///
/// The bytes are immutable once built. Archives are deliberately not
/// `Clone`: each one belongs to the delivery attempt that produced it.
pub struct Archive {
	bytes: Vec<u8>,
}

impl Archive {
	/// Wraps zip bytes read back from disk.
	pub fn from_bytes(bytes: Vec<u8>) -> Self {
		Self { bytes }
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	pub fn into_bytes(self) -> Vec<u8> {
		self.bytes
	}

	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}

	/// Lists entry names in the order they were written.
	pub fn entry_names(&self) -> Result<Vec<String>> {
		let zip = ZipArchive::new(Cursor::new(self.bytes.as_slice()))?;
		Ok(zip.file_names().map(str::to_string).collect())
	}

	/// Reads the content of one entry, or `None` if no such entry exists.
	pub fn read_entry(&self, name: &str) -> Result<Option<Vec<u8>>> {
		let mut zip = ZipArchive::new(Cursor::new(self.bytes.as_slice()))?;
		let mut file = match zip.by_name(name) {
			Ok(file) => file,
			Err(zip::result::ZipError::FileNotFound) => return Ok(None),
			Err(e) => return Err(e.into()),
		};
		let mut content = Vec::with_capacity(file.size() as usize);
		file.read_to_end(&mut content)?;
		Ok(Some(content))
	}
}

impl fmt::Debug for Archive {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Archive").field("len", &self.bytes.len()).finish()
	}
}

/// Starts a new, empty archive.
pub fn begin_archive() -> ArchiveWriter {
	ArchiveWriter::new()
}

/// Accumulates named entries into an in-memory zip.
///
/// Every `add_*` method returns `true` when an entry was written and `false`
/// when the source was skipped (empty, missing, unreadable or a duplicate
/// name). Failures are logged, never propagated.
pub struct ArchiveWriter {
	zip: ZipWriter<Cursor<Vec<u8>>>,
	names: HashSet<String>,
	entries: Vec<String>,
}

impl ArchiveWriter {
	pub fn new() -> Self {
		Self {
			zip: ZipWriter::new(Cursor::new(Vec::new())),
			names: HashSet::new(),
			entries: Vec::new(),
		}
	}

	/// Copies everything `reader` yields into a new entry.
	///
	/// The reader is drained before the entry is opened, so a read error
	/// leaves no partial entry behind.
	pub fn add_stream(&mut self, name: &str, modified: DateTime<Utc>, reader: &mut dyn Read) -> bool {
		let mut data = Vec::new();
		if let Err(e) = reader.read_to_end(&mut data) {
			warn!(entry = %name, error = %e, "failed to read stream for archive entry");
			return false;
		}
		self.add_bytes(name, modified, &data)
	}

	/// Writes raw bytes as a new entry.
	pub fn add_bytes(&mut self, name: &str, modified: DateTime<Utc>, data: &[u8]) -> bool {
		match self.try_add(name, modified, data) {
			Ok(()) => {
				debug!(entry = %name, bytes = data.len(), "added archive entry");
				true
			}
			Err(e) => {
				warn!(entry = %name, error = %e, "failed to add archive entry");
				false
			}
		}
	}

	/// Writes `text` as UTF-8. Blank text produces no entry.
	pub fn add_string(&mut self, name: &str, text: &str) -> bool {
		if text.trim().is_empty() {
			return false;
		}
		self.add_bytes(name, Utc::now(), text.as_bytes())
	}

	/// Copies a file from disk, stamped with its last modification time.
	///
	/// `zip_name` defaults to the file name of `path`. A missing file is
	/// silently skipped.
	pub fn add_file(&mut self, path: impl AsRef<Path>, zip_name: Option<&str>) -> bool {
		let path = path.as_ref();
		if !path.is_file() {
			debug!(path = %path.display(), "skipping missing file");
			return false;
		}

		let name = match zip_name {
			Some(name) => name.to_string(),
			None => match path.file_name() {
				Some(name) => name.to_string_lossy().into_owned(),
				None => return false,
			},
		};

		let read = std::fs::metadata(path)
			.and_then(|meta| meta.modified())
			.and_then(|modified| std::fs::read(path).map(|data| (modified, data)));

		match read {
			Ok((modified, data)) => self.add_bytes(&name, DateTime::<Utc>::from(modified), &data),
			Err(e) => {
				warn!(path = %path.display(), error = %e, "failed to read file for archive");
				false
			}
		}
	}

	/// Writes a text dump of the OS, runtime and loaded modules.
	pub fn add_environment_info(&mut self, name: &str) -> bool {
		let info = EnvironmentInfo::collect();
		self.add_string(name, &info.render())
	}

	/// Writes an already-encoded PNG, by default as `screenshot.png`.
	pub fn add_screenshot(&mut self, png: &[u8], name: Option<&str>) -> bool {
		if png.is_empty() {
			return false;
		}
		self.add_bytes(name.unwrap_or(SCREENSHOT_ENTRY), Utc::now(), png)
	}

	/// Names written so far, in order.
	pub fn entry_names(&self) -> &[String] {
		&self.entries
	}

	/// Closes the zip and returns the finished archive.
	pub fn finish(self) -> Result<Archive> {
		let cursor = self.zip.finish()?;
		Ok(Archive::from_bytes(cursor.into_inner()))
	}

	fn try_add(&mut self, name: &str, modified: DateTime<Utc>, data: &[u8]) -> Result<()> {
		if self.names.contains(name) {
			return Err(ReportError::DuplicateEntry(name.to_string()));
		}

		let options = SimpleFileOptions::default()
			.compression_method(CompressionMethod::Deflated)
			.last_modified_time(zip_timestamp(modified));

		self.zip.start_file(name, options)?;
		self.zip.write_all(data)?;

		self.names.insert(name.to_string());
		self.entries.push(name.to_string());
		Ok(())
	}
}

impl Default for ArchiveWriter {
	fn default() -> Self {
		Self::new()
	}
}

/// Zip timestamps cannot represent dates before 1980; those clamp to the
/// format's epoch.
fn zip_timestamp(time: DateTime<Utc>) -> zip::DateTime {
	let year = u16::try_from(time.year()).unwrap_or(0);
	zip::DateTime::from_date_and_time(
		year,
		time.month() as u8,
		time.day() as u8,
		time.hour() as u8,
		time.minute() as u8,
		time.second() as u8,
	)
	.unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use tempfile::TempDir;

	struct FailingReader;

	impl Read for FailingReader {
		fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
			Err(std::io::Error::other("device unplugged"))
		}
	}

	#[test]
	fn blank_strings_produce_no_entry() {
		let mut writer = begin_archive();
		assert!(!writer.add_string("empty.txt", ""));
		assert!(!writer.add_string("spaces.txt", "  \r\n\t "));
		assert!(writer.add_string("real.txt", "content"));

		let archive = writer.finish().unwrap();
		assert_eq!(archive.entry_names().unwrap(), vec!["real.txt"]);
	}

	#[test]
	fn missing_file_is_skipped() {
		let dir = TempDir::new().unwrap();
		let mut writer = begin_archive();
		assert!(!writer.add_file(dir.path().join("nope.log"), None));

		let archive = writer.finish().unwrap();
		assert!(archive.entry_names().unwrap().is_empty());
	}

	#[test]
	fn add_file_defaults_to_file_name() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("app.log");
		std::fs::write(&path, b"line one\n").unwrap();

		let mut writer = begin_archive();
		assert!(writer.add_file(&path, None));
		assert!(writer.add_file(&path, Some("logs/renamed.log")));

		let archive = writer.finish().unwrap();
		assert_eq!(
			archive.entry_names().unwrap(),
			vec!["app.log", "logs/renamed.log"]
		);
		assert_eq!(
			archive.read_entry("logs/renamed.log").unwrap().unwrap(),
			b"line one\n"
		);
	}

	#[test]
	fn failing_stream_does_not_abort_archive() {
		let mut writer = begin_archive();
		assert!(writer.add_string("before.txt", "a"));
		assert!(!writer.add_stream("broken.bin", Utc::now(), &mut FailingReader));
		assert!(writer.add_string("after.txt", "b"));

		let archive = writer.finish().unwrap();
		assert_eq!(archive.entry_names().unwrap(), vec!["before.txt", "after.txt"]);
	}

	#[test]
	fn duplicate_names_are_rejected() {
		let mut writer = begin_archive();
		assert!(writer.add_string("notes.txt", "first"));
		assert!(!writer.add_string("notes.txt", "second"));

		let archive = writer.finish().unwrap();
		assert_eq!(archive.read_entry("notes.txt").unwrap().unwrap(), b"first");
	}

	#[test]
	fn read_entry_missing_returns_none() {
		let mut writer = begin_archive();
		writer.add_string("a.txt", "a");
		let archive = writer.finish().unwrap();
		assert!(archive.read_entry("b.txt").unwrap().is_none());
	}

	#[test]
	fn environment_info_entry_is_text() {
		let mut writer = begin_archive();
		assert!(writer.add_environment_info(ENVIRONMENT_ENTRY));
		let archive = writer.finish().unwrap();
		let text = String::from_utf8(archive.read_entry(ENVIRONMENT_ENTRY).unwrap().unwrap()).unwrap();
		assert!(text.contains("OS:"));
	}

	#[test]
	fn screenshot_uses_default_name() {
		let mut writer = begin_archive();
		assert!(!writer.add_screenshot(&[], None));
		assert!(writer.add_screenshot(&[0x89, b'P', b'N', b'G'], None));
		let archive = writer.finish().unwrap();
		assert_eq!(archive.entry_names().unwrap(), vec![SCREENSHOT_ENTRY]);
	}

	#[test]
	fn pre_1980_timestamps_clamp() {
		let old = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
		let mut writer = begin_archive();
		assert!(writer.add_bytes("old.bin", old, b"x"));
		assert!(writer.finish().is_ok());
	}

	mod property_tests {
		use super::*;
		use proptest::collection::{btree_map, vec};
		use proptest::prelude::*;

		proptest! {
			#[test]
			fn entries_round_trip_through_zip_reader(
				entries in btree_map("[a-z]{1,12}\\.(txt|bin)", vec(any::<u8>(), 0..256), 0..8)
			) {
				let mut writer = begin_archive();
				for (name, data) in &entries {
					prop_assert!(writer.add_bytes(name, Utc::now(), data));
				}
				let archive = writer.finish().unwrap();

				let names = archive.entry_names().unwrap();
				prop_assert_eq!(names.len(), entries.len());
				for (name, data) in &entries {
					let content = archive.read_entry(name).unwrap();
					prop_assert_eq!(content.as_ref(), Some(data));
				}
			}
		}
	}
}
