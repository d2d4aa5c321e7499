// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error report SDK.
//!
//! Applications build a [`LogSender`] over an HTTP or SMTP transport, attach
//! hooks that add their own files, and install a [`LastChanceHandler`] so
//! that unexpected panics are logged and the user gets a say in whether the
//! process keeps running. Reports that cannot be delivered are spooled and
//! replayed with [`LogSender::resend_pending`].
//!
//! ```no_run
//! use loom_report::{LastChanceHandler, LogSender, Traps, UserInfo};
//!
//! # fn main() -> loom_report::Result<()> {
//! let config = loom_report_config::load_config()?;
//! let _logging = loom_report::logging::init(&config)?;
//! let _handler = LastChanceHandler::new(Traps::Both).install()?;
//!
//! let sender = LogSender::from_config(&config)?;
//! let form = UserInfo {
//! 	notes: "Crashed after saving".into(),
//! 	..Default::default()
//! };
//! sender.send_with_pending(Some(&form));
//! # Ok(())
//! # }
//! ```

pub mod collect;
pub mod error;
pub mod gather;
pub mod handler;
pub mod http;
pub mod listener;
pub mod lock;
pub mod logfile;
pub mod logging;
pub mod prompt;
pub mod sender;

pub use collect::UserInfo;
pub use error::{Result, SdkError};
pub use gather::{InfoGatherer, InfoGathering, WindowKind};
pub use handler::{
	ExceptionEvent, ExceptionInfo, HandlerDecision, LastChanceHandler, MessageLogged, TrapKind, Traps,
};
pub use http::HttpTransport;
pub use listener::{Listener, ListenerId, ListenerLayer, ListenerRegistry, LogMessage, MessageBuffer};
pub use lock::NamedLock;
pub use logfile::{LogFile, LogFileOptions};
pub use prompt::{ProcessExit, PromptButtons, PromptChoice, Prompter, StderrPrompter, Terminator};
pub use sender::{ArchiveHook, EnvironmentCollator, HookError, LogSender};

pub use loom_report_core::{Archive, ArchiveWriter, Transport, TransportResult};
pub use loom_report_smtp::MailTransport;
