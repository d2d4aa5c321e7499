// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod http;
mod log;
mod logging;
mod smtp;
mod spool;
mod traps;

pub use http::{HttpConfig, HttpConfigLayer};
pub use log::{LogConfig, LogConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use smtp::{SmtpConfig, SmtpConfigLayer, TlsMode};
pub use spool::{SpoolConfig, SpoolConfigLayer};
pub use traps::{Traps, TrapsConfig, TrapsConfigLayer};

/// Default timeout for one delivery attempt, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
