// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which unhandled-panic traps the last-chance handler installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Traps {
	MainThread,
	BackgroundThread,
	#[default]
	Both,
}

impl Traps {
	pub fn main_thread(self) -> bool {
		matches!(self, Self::MainThread | Self::Both)
	}

	pub fn background_thread(self) -> bool {
		matches!(self, Self::BackgroundThread | Self::Both)
	}
}

impl std::str::FromStr for Traps {
	type Err = ConfigError;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value.to_lowercase().replace('-', "_").as_str() {
			"main_thread" | "main" => Ok(Self::MainThread),
			"background_thread" | "background" => Ok(Self::BackgroundThread),
			"both" => Ok(Self::Both),
			_ => Err(ConfigError::invalid_value(
				"traps.install",
				format!("'{value}', expected main_thread, background_thread or both"),
			)),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrapsConfigLayer {
	pub install: Option<Traps>,
}

impl TrapsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.install.is_some() {
			self.install = other.install;
		}
	}

	pub fn finalize(self) -> TrapsConfig {
		TrapsConfig {
			install: self.install.unwrap_or_default(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrapsConfig {
	pub install: Traps,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_kebab_and_short_forms() {
		assert_eq!("main-thread".parse::<Traps>().unwrap(), Traps::MainThread);
		assert_eq!("background".parse::<Traps>().unwrap(), Traps::BackgroundThread);
		assert_eq!("BOTH".parse::<Traps>().unwrap(), Traps::Both);
		assert!("neither".parse::<Traps>().is_err());
	}

	#[test]
	fn both_covers_each_category() {
		assert!(Traps::Both.main_thread() && Traps::Both.background_thread());
		assert!(!Traps::MainThread.background_thread());
		assert!(!Traps::BackgroundThread.main_thread());
	}
}
