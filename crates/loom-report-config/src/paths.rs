// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! XDG locations for the report config file and spool folder.

use std::path::PathBuf;

/// `$XDG_CONFIG_HOME/loom/report.toml`, falling back to `~/.config`.
pub fn user_config_file() -> Option<PathBuf> {
	let config_home = std::env::var_os("XDG_CONFIG_HOME")
		.map(PathBuf::from)
		.or_else(|| dirs::home_dir().map(|home| home.join(".config")))?;
	Some(config_home.join("loom/report.toml"))
}

/// `$XDG_DATA_HOME/loom/report-spool`, falling back to `~/.local/share`,
/// then to the system temp directory when no home directory is known.
pub fn default_spool_folder() -> PathBuf {
	let data_home = std::env::var_os("XDG_DATA_HOME")
		.map(PathBuf::from)
		.or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
		.unwrap_or_else(std::env::temp_dir);
	data_home.join("loom/report-spool")
}

#[cfg(test)]
mod tests {
	use super::*;
	use serial_test::serial;

	#[test]
	#[serial]
	fn honours_xdg_overrides() {
		std::env::set_var("XDG_CONFIG_HOME", "/tmp/xdg-config");
		std::env::set_var("XDG_DATA_HOME", "/tmp/xdg-data");

		assert_eq!(
			user_config_file(),
			Some(PathBuf::from("/tmp/xdg-config/loom/report.toml"))
		);
		assert_eq!(
			default_spool_folder(),
			PathBuf::from("/tmp/xdg-data/loom/report-spool")
		);

		std::env::remove_var("XDG_CONFIG_HOME");
		std::env::remove_var("XDG_DATA_HOME");
	}

	#[test]
	#[serial]
	fn spool_folder_always_ends_in_loom() {
		assert!(default_spool_folder().ends_with("loom/report-spool"));
	}
}
