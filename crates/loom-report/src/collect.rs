// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! What the user typed into the "send error report" form.

use loom_report_core::{ArchiveWriter, SCREENSHOT_ENTRY};

use crate::sender::{ArchiveHook, HookError};

pub const SENDER_ENTRY: &str = "sender.txt";
pub const NOTES_ENTRY: &str = "notes.txt";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserInfo {
	pub name: String,
	pub email: String,
	pub notes: String,
	/// PNG bytes captured before the form was shown.
	pub screenshot: Option<Vec<u8>>,
	pub include_screenshot: bool,
}

impl UserInfo {
	fn sender(&self) -> Option<String> {
		if self.name.trim().is_empty() && self.email.trim().is_empty() {
			return None;
		}
		Some(format!("{}\r\n{}", self.name, self.email))
	}
}

impl ArchiveHook for UserInfo {
	fn add_files(&self, writer: &mut ArchiveWriter) -> Result<(), HookError> {
		if let Some(sender) = self.sender() {
			writer.add_string(SENDER_ENTRY, &sender);
		}
		if self.include_screenshot {
			if let Some(png) = &self.screenshot {
				writer.add_screenshot(png, Some(SCREENSHOT_ENTRY));
			}
		}
		writer.add_string(NOTES_ENTRY, &self.notes);
		Ok(())
	}
}
