// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Environment dump attached to every report.

use std::fmt::Write as _;
use std::path::PathBuf;

shadow_rs::shadow!(build);

const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// OS, runtime and module details for the process that produced a report.
#[derive(Debug, Clone)]
pub struct EnvironmentInfo {
	pub os: String,
	pub os_version: Option<String>,
	pub arch: String,
	pub is_64_bit: bool,
	pub hostname: Option<String>,
	/// `rustc -V` of the toolchain the process was built with.
	pub rust_version: String,
	pub sdk_version: String,
	pub executable: Option<PathBuf>,
	pub modules: Vec<PathBuf>,
}

impl EnvironmentInfo {
	/// Gathers details about the running process. Anything that cannot be
	/// determined is left empty rather than failing.
	pub fn collect() -> Self {
		Self {
			os: std::env::consts::OS.to_string(),
			os_version: os_version(),
			arch: std::env::consts::ARCH.to_string(),
			is_64_bit: cfg!(target_pointer_width = "64"),
			hostname: hostname::get().ok().map(|h| h.to_string_lossy().into_owned()),
			rust_version: build::RUST_VERSION.trim().to_string(),
			sdk_version: SDK_VERSION.to_string(),
			executable: std::env::current_exe().ok(),
			modules: loaded_modules(),
		}
	}

	/// Renders the dump as readable text.
	pub fn render(&self) -> String {
		let mut s = String::new();
		let _ = writeln!(
			s,
			"OS: {} {}",
			self.os,
			self.os_version.as_deref().unwrap_or("(unknown version)")
		);
		let _ = writeln!(s, "Architecture: {}", self.arch);
		let _ = writeln!(s, "64 Bit: {}", if self.is_64_bit { "Y" } else { "N" });
		if let Some(host) = &self.hostname {
			let _ = writeln!(s, "Host: {host}");
		}
		let _ = writeln!(s, "Runtime Version: {}", self.rust_version);
		let _ = writeln!(s, "Report SDK Version: {}", self.sdk_version);
		if let Some(exe) = &self.executable {
			let _ = writeln!(s, "Executable: {}", exe.display());
		}
		s.push('\n');

		for module in &self.modules {
			let _ = writeln!(s, "Module: {}", module.display());
		}
		s
	}
}

#[cfg(target_os = "linux")]
fn os_version() -> Option<String> {
	let release = std::fs::read_to_string("/etc/os-release").ok()?;
	parse_os_release(&release)
}

#[cfg(not(target_os = "linux"))]
fn os_version() -> Option<String> {
	None
}

fn parse_os_release(content: &str) -> Option<String> {
	content
		.lines()
		.find_map(|line| line.strip_prefix("PRETTY_NAME="))
		.map(|v| v.trim_matches('"').to_string())
		.filter(|v| !v.is_empty())
}

/// Shared objects mapped into the process, deduplicated, in load order.
#[cfg(target_os = "linux")]
fn loaded_modules() -> Vec<PathBuf> {
	match std::fs::read_to_string("/proc/self/maps") {
		Ok(maps) => parse_maps(&maps),
		Err(_) => Vec::new(),
	}
}

#[cfg(not(target_os = "linux"))]
fn loaded_modules() -> Vec<PathBuf> {
	std::env::current_exe().ok().into_iter().collect()
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_maps(maps: &str) -> Vec<PathBuf> {
	let mut modules: Vec<PathBuf> = Vec::new();
	for line in maps.lines() {
		// address perms offset dev inode pathname
		let Some(path) = line.split_whitespace().nth(5) else {
			continue;
		};
		if !path.starts_with('/') {
			continue;
		}
		let path = PathBuf::from(path);
		if !modules.contains(&path) {
			modules.push(path);
		}
	}
	modules
}
