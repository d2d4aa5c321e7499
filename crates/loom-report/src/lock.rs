// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! A named, cross-process exclusive lock backed by an OS file lock.
//!
//! Every process opening the same name locks the same file under the
//! system temp directory, so writers in different processes sharing one log
//! file take turns.

use std::fs::{File, OpenOptions, TryLockError};
use std::io;
use std::path::{Path, PathBuf};

pub struct NamedLock {
	path: PathBuf,
	file: File,
}

impl NamedLock {
	/// Opens (creating if needed) `<temp dir>/<name>.lock`.
	pub fn open(name: &str) -> io::Result<Self> {
		Self::open_in(&std::env::temp_dir(), name)
	}

	pub fn open_in(dir: &Path, name: &str) -> io::Result<Self> {
		let sanitized: String = name
			.chars()
			.map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
			.collect();
		if sanitized.is_empty() {
			return Err(io::Error::new(io::ErrorKind::InvalidInput, "lock name is empty"));
		}

		let path = dir.join(format!("{sanitized}.lock"));
		let file = OpenOptions::new()
			.create(true)
			.truncate(false)
			.read(true)
			.write(true)
			.open(&path)?;
		Ok(Self { path, file })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Blocks until the lock is held.
	pub fn acquire(&self) -> io::Result<NamedLockGuard<'_>> {
		self.file.lock()?;
		Ok(NamedLockGuard { file: &self.file })
	}

	/// Returns `None` if someone else holds the lock.
	pub fn try_acquire(&self) -> io::Result<Option<NamedLockGuard<'_>>> {
		match self.file.try_lock() {
			Ok(()) => Ok(Some(NamedLockGuard { file: &self.file })),
			Err(TryLockError::WouldBlock) => Ok(None),
			Err(TryLockError::Error(e)) => Err(e),
		}
	}
}

/// Releases the lock on drop.
pub struct NamedLockGuard<'a> {
	file: &'a File,
}

impl Drop for NamedLockGuard<'_> {
	fn drop(&mut self) {
		let _ = self.file.unlock();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn second_handle_waits_for_release() {
		let dir = TempDir::new().unwrap();
		let first = NamedLock::open_in(dir.path(), "app-log").unwrap();
		let second = NamedLock::open_in(dir.path(), "app-log").unwrap();
		assert_eq!(first.path(), second.path());

		let held = first.acquire().unwrap();
		assert!(second.try_acquire().unwrap().is_none());
		drop(held);

		assert!(second.try_acquire().unwrap().is_some());
	}

	#[test]
	fn names_are_sanitized() {
		let dir = TempDir::new().unwrap();
		let lock = NamedLock::open_in(dir.path(), "Global\\loom/log").unwrap();
		assert_eq!(lock.path().file_name().unwrap(), "Global_loom_log.lock");
		assert!(NamedLock::open_in(dir.path(), "").is_err());
	}

	mod proptests {
		use super::*;
		use proptest::prelude::*;

		proptest! {
			#![proptest_config(ProptestConfig::with_cases(64))]

			#[test]
			fn lock_file_stays_in_its_directory(name in "\\PC{1,24}") {
				let dir = TempDir::new().unwrap();
				let lock = NamedLock::open_in(dir.path(), &name).unwrap();
				prop_assert_eq!(lock.path().parent(), Some(dir.path()));
			}
		}
	}
}
