// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User prompts and process termination used by the last-chance handler.
//!
//! Both are traits so a GUI can plug in a real modal dialog and tests can
//! record what would have happened without exiting.

use std::io::Write;
use std::sync::Arc;

/// Title of every prompt the handler shows.
pub const PROMPT_TITLE: &str = "Unexpected Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptButtons {
	/// The user may keep running (OK) or exit (Cancel).
	OkCancel,
	/// Information only; the answer is ignored.
	Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
	Ok,
	Cancel,
}

pub trait Prompter: Send + Sync {
	fn prompt(&self, title: &str, message: &str, buttons: PromptButtons) -> PromptChoice;
}

impl<P: Prompter + ?Sized> Prompter for Arc<P> {
	fn prompt(&self, title: &str, message: &str, buttons: PromptButtons) -> PromptChoice {
		(**self).prompt(title, message, buttons)
	}
}

/// Writes the prompt to stderr and answers [`PromptChoice::Ok`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrPrompter;

impl Prompter for StderrPrompter {
	fn prompt(&self, title: &str, message: &str, _buttons: PromptButtons) -> PromptChoice {
		// Runs inside the panic hook: a failed write must not panic.
		let _ = writeln!(std::io::stderr(), "{title}: {}", message.replace("\r\n", "\n"));
		PromptChoice::Ok
	}
}

pub trait Terminator: Send + Sync {
	fn terminate(&self);
}

impl<T: Terminator + ?Sized> Terminator for Arc<T> {
	fn terminate(&self) {
		(**self).terminate()
	}
}

/// Exits the process with status 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExit;

impl Terminator for ProcessExit {
	fn terminate(&self) {
		std::process::exit(0);
	}
}
