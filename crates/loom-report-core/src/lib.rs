// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core building blocks for Loom error reports.
//!
//! This crate holds the pieces every transport and the orchestrator share:
//! the in-memory zip [`Archive`], the on-disk [`SpoolStore`] of undelivered
//! archives and the [`Transport`] contract.

pub mod archive;
pub mod environment;
pub mod error;
pub mod secret;
pub mod spool;
pub mod transport;

pub use archive::{begin_archive, Archive, ArchiveWriter, ENVIRONMENT_ENTRY, SCREENSHOT_ENTRY};
pub use environment::EnvironmentInfo;
pub use error::{ReportError, Result};
pub use secret::{SecretString, REDACTED};
pub use spool::{SpoolStore, SpooledItem, SPOOL_NAME_FORMAT};
pub use transport::{PendingArchive, Transport, TransportResult};
