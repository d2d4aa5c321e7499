// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{
	HttpConfigLayer, LogConfigLayer, LoggingConfigLayer, SmtpConfigLayer, SpoolConfigLayer,
	TrapsConfigLayer,
};

/// Report configuration layer. Every field is optional so layers can stack.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfigLayer {
	#[serde(default)]
	pub spool: Option<SpoolConfigLayer>,
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	#[serde(default)]
	pub smtp: Option<SmtpConfigLayer>,
	#[serde(default)]
	pub log: Option<LogConfigLayer>,
	#[serde(default)]
	pub traps: Option<TrapsConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl ReportConfigLayer {
	/// Merge another layer into this one. `other` wins field by field.
	pub fn merge(&mut self, other: ReportConfigLayer) {
		merge_option(&mut self.spool, other.spool, SpoolConfigLayer::merge);
		merge_option(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_option(&mut self.smtp, other.smtp, SmtpConfigLayer::merge);
		merge_option(&mut self.log, other.log, LogConfigLayer::merge);
		merge_option(&mut self.traps, other.traps, TrapsConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}
