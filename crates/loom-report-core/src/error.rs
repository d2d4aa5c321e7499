// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for report packaging and spooling.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building, spooling or reading report archives.
///
/// None of these escape the public delivery entry points; they are logged
/// at the boundary and turned into a `false` result.
#[derive(Debug, Error)]
pub enum ReportError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("zip error: {0}")]
	Zip(#[from] zip::result::ZipError),

	#[error("archive already contains an entry named '{0}'")]
	DuplicateEntry(String),

	#[error("spool file already exists: {}", .0.display())]
	SpoolCollision(PathBuf),
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;
