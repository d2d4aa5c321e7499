// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::paths::default_spool_folder;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpoolConfigLayer {
	pub folder: Option<PathBuf>,
}

impl SpoolConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.folder.is_some() {
			self.folder = other.folder;
		}
	}

	pub fn finalize(self) -> SpoolConfig {
		SpoolConfig {
			folder: self.folder.unwrap_or_else(default_spool_folder),
		}
	}
}

/// Where undelivered archives wait for the next resend.
#[derive(Debug, Clone, PartialEq)]
pub struct SpoolConfig {
	pub folder: PathBuf,
}
