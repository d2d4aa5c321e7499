// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Log file writer section.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LogConfigLayer {
	pub file: Option<PathBuf>,
	pub daily_folder: Option<PathBuf>,
	pub max_size_bytes: Option<u64>,
	pub instance: Option<String>,
	pub utc: Option<bool>,
	pub auto_flush: Option<bool>,
	pub lock_name: Option<String>,
}

impl LogConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.file.is_some() {
			self.file = other.file;
		}
		if other.daily_folder.is_some() {
			self.daily_folder = other.daily_folder;
		}
		if other.max_size_bytes.is_some() {
			self.max_size_bytes = other.max_size_bytes;
		}
		if other.instance.is_some() {
			self.instance = other.instance;
		}
		if other.utc.is_some() {
			self.utc = other.utc;
		}
		if other.auto_flush.is_some() {
			self.auto_flush = other.auto_flush;
		}
		if other.lock_name.is_some() {
			self.lock_name = other.lock_name;
		}
	}

	pub fn finalize(self) -> Result<LogConfig, ConfigError> {
		if self.file.is_some() && self.daily_folder.is_some() {
			return Err(ConfigError::Validation(
				"log.file and log.daily_folder are mutually exclusive".into(),
			));
		}
		if self.max_size_bytes.is_some() && self.file.is_none() {
			return Err(ConfigError::Validation(
				"log.max_size_bytes only applies to log.file".into(),
			));
		}

		Ok(LogConfig {
			file: self.file,
			daily_folder: self.daily_folder,
			max_size_bytes: self.max_size_bytes,
			instance: self.instance.filter(|i| !i.is_empty()),
			utc: self.utc.unwrap_or(false),
			auto_flush: self.auto_flush.unwrap_or(true),
			lock_name: self.lock_name.filter(|n| !n.is_empty()),
		})
	}
}

/// Optional plain-text log kept next to the application and bundled into
/// reports. Neither `file` nor `daily_folder` set means no log file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogConfig {
	pub file: Option<PathBuf>,
	pub daily_folder: Option<PathBuf>,
	pub max_size_bytes: Option<u64>,
	pub instance: Option<String>,
	pub utc: bool,
	pub auto_flush: bool,
	pub lock_name: Option<String>,
}
