// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Last-chance handling of panics nothing else caught.
//!
//! Two traps exist. The main-thread trap covers UI work run through
//! [`LastChanceHandler::guard`]; a panic unwinding out of the guarded
//! closure lands there. The background trap is a process panic hook that
//! sees every other panic.
//!
//! Either trap can be taken over entirely by a subscriber. Without one the
//! panic is logged, `message_logged` subscribers may adjust what happens
//! next, the user is prompted and the process may be terminated.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use loom_report_config::TrapsConfig;
use parking_lot::{const_mutex, Mutex, RwLock};
use tracing::{error, info};

use crate::error::{Result, SdkError};
use crate::prompt::{
	ProcessExit, PromptButtons, PromptChoice, Prompter, StderrPrompter, Terminator, PROMPT_TITLE,
};

pub use loom_report_config::Traps;

const UNKNOWN_EXCEPTION: &str = "Unknown Exception";

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static>;
type TrapCallback = Arc<dyn Fn(&ExceptionEvent) + Send + Sync>;
type MessageLoggedCallback = Arc<dyn Fn(&mut MessageLogged) + Send + Sync>;
type AppClosingCallback = Arc<dyn Fn() + Send + Sync>;

/// The panic hook that was active before [`LastChanceHandler::install`].
static PREVIOUS_HOOK: Mutex<Option<Arc<PanicHook>>> = const_mutex(None);

thread_local! {
	static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
	static HANDLING: Cell<bool> = const { Cell::new(false) };
	static CAPTURED: RefCell<Option<ExceptionInfo>> = const { RefCell::new(None) };
}

/// Runs `f` and hands back its panic as an [`ExceptionInfo`]. The panic
/// never reaches an installed trap.
pub(crate) fn contain<R>(f: impl FnOnce() -> R) -> std::result::Result<R, ExceptionInfo> {
	GUARD_DEPTH.with(|d| d.set(d.get() + 1));
	let result = panic::catch_unwind(AssertUnwindSafe(f));
	GUARD_DEPTH.with(|d| d.set(d.get() - 1));

	result.map_err(|payload| {
		CAPTURED
			.with(|c| c.borrow_mut().take())
			.unwrap_or_else(|| ExceptionInfo::from_payload(payload.as_ref()))
	})
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapKind {
	MainThread,
	BackgroundThread,
}

/// What is known about a trapped panic.
#[derive(Debug, Clone, Default)]
pub struct ExceptionInfo {
	/// `None` when the payload was neither a `&str` nor a `String`.
	pub message: Option<String>,
	pub location: Option<String>,
	pub thread: Option<String>,
	pub backtrace: Option<String>,
}

impl ExceptionInfo {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: Some(message.into()),
			..Default::default()
		}
	}

	pub fn from_panic(info: &PanicHookInfo<'_>) -> Self {
		Self {
			message: payload_message(info.payload()),
			location: info
				.location()
				.map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column())),
			thread: thread::current().name().map(str::to_string),
			backtrace: Some(Backtrace::force_capture().to_string()),
		}
	}

	fn from_payload(payload: &(dyn Any + Send)) -> Self {
		Self {
			message: payload_message(payload),
			thread: thread::current().name().map(str::to_string),
			..Default::default()
		}
	}

	/// The message shown to the user.
	pub fn display_message(&self) -> &str {
		self.message.as_deref().unwrap_or(UNKNOWN_EXCEPTION)
	}
}

impl fmt::Display for ExceptionInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.display_message())?;
		if let Some(location) = &self.location {
			write!(f, " at {location}")?;
		}
		if let Some(thread) = &self.thread {
			write!(f, " on thread '{thread}'")?;
		}
		Ok(())
	}
}

fn payload_message(payload: &(dyn Any + Send)) -> Option<String> {
	if let Some(s) = payload.downcast_ref::<&str>() {
		Some(s.to_string())
	} else {
		payload.downcast_ref::<String>().cloned()
	}
}

/// A trapped panic, handed to trap subscribers.
#[derive(Debug, Clone)]
pub struct ExceptionEvent {
	pub origin: TrapKind,
	pub exception: ExceptionInfo,
	is_terminating: bool,
}

impl ExceptionEvent {
	pub fn new(origin: TrapKind, exception: ExceptionInfo, is_terminating: bool) -> Self {
		Self {
			origin,
			exception,
			is_terminating: origin == TrapKind::BackgroundThread && is_terminating,
		}
	}

	/// Set by the runtime for background panics the process cannot survive.
	/// Always `false` for the main-thread trap.
	pub fn is_terminating(&self) -> bool {
		self.is_terminating
	}
}

/// Notification raised after a panic was logged. Subscribers may hide the
/// prompt or request termination.
#[derive(Debug, Clone)]
pub struct MessageLogged {
	pub trap: TrapKind,
	pub exception: ExceptionInfo,
	pub display_message_box: bool,
	pub terminating: bool,
}

impl MessageLogged {
	fn new(event: &ExceptionEvent) -> Self {
		Self {
			trap: event.origin,
			exception: event.exception.clone(),
			display_message_box: true,
			terminating: event.is_terminating(),
		}
	}

	pub fn decision(&self) -> HandlerDecision {
		HandlerDecision {
			suppress_default_ui: !self.display_message_box,
			force_terminate: self.terminating,
		}
	}
}

/// How a trapped panic was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandlerDecision {
	pub suppress_default_ui: bool,
	pub force_terminate: bool,
}

impl HandlerDecision {
	fn overridden() -> Self {
		Self {
			suppress_default_ui: true,
			force_terminate: false,
		}
	}
}

pub struct LastChanceHandler {
	traps: Traps,
	ui_thread: ThreadId,
	prompter: Box<dyn Prompter>,
	terminator: Box<dyn Terminator>,
	on_main_thread: RwLock<Option<TrapCallback>>,
	on_background_thread: RwLock<Option<TrapCallback>>,
	on_message_logged: RwLock<Vec<MessageLoggedCallback>>,
	on_app_closing: RwLock<Vec<AppClosingCallback>>,
}

impl LastChanceHandler {
	/// Creates a handler owned by the calling thread, which is treated as
	/// the UI thread.
	pub fn new(traps: Traps) -> Self {
		Self {
			traps,
			ui_thread: thread::current().id(),
			prompter: Box::new(StderrPrompter),
			terminator: Box::new(ProcessExit),
			on_main_thread: RwLock::new(None),
			on_background_thread: RwLock::new(None),
			on_message_logged: RwLock::new(Vec::new()),
			on_app_closing: RwLock::new(Vec::new()),
		}
	}

	pub fn from_config(config: &TrapsConfig) -> Self {
		Self::new(config.install)
	}

	pub fn with_prompter(mut self, prompter: impl Prompter + 'static) -> Self {
		self.prompter = Box::new(prompter);
		self
	}

	pub fn with_terminator(mut self, terminator: impl Terminator + 'static) -> Self {
		self.terminator = Box::new(terminator);
		self
	}

	pub fn traps(&self) -> Traps {
		self.traps
	}

	/// Takes over the main-thread trap. Default handling is skipped.
	pub fn on_main_thread(&self, f: impl Fn(&ExceptionEvent) + Send + Sync + 'static) {
		*self.on_main_thread.write() = Some(Arc::new(f));
	}

	/// Takes over the background trap. Default handling is skipped.
	pub fn on_background_thread(&self, f: impl Fn(&ExceptionEvent) + Send + Sync + 'static) {
		*self.on_background_thread.write() = Some(Arc::new(f));
	}

	pub fn on_message_logged(&self, f: impl Fn(&mut MessageLogged) + Send + Sync + 'static) {
		self.on_message_logged.write().push(Arc::new(f));
	}

	/// Called right before the handler terminates the process.
	pub fn on_app_closing(&self, f: impl Fn() + Send + Sync + 'static) {
		self.on_app_closing.write().push(Arc::new(f));
	}

	/// Makes this handler the process panic hook.
	///
	/// Fails with [`SdkError::AlreadyInstalled`] while another handler is
	/// installed.
	pub fn install(self) -> Result<Arc<Self>> {
		let mut previous_slot = PREVIOUS_HOOK.lock();
		if previous_slot.is_some() {
			return Err(SdkError::AlreadyInstalled);
		}

		let handler = Arc::new(self);
		let previous: Arc<PanicHook> = Arc::new(panic::take_hook());

		let hook_handler = Arc::clone(&handler);
		let hook_previous = Arc::clone(&previous);
		panic::set_hook(Box::new(move |info| {
			hook_handler.on_panic(info, &hook_previous);
		}));

		*previous_slot = Some(previous);
		info!(traps = ?handler.traps, "last-chance handler installed");
		Ok(handler)
	}

	/// Restores the panic hook that was active before [`install`].
	/// Returns `false` if no handler was installed.
	///
	/// [`install`]: LastChanceHandler::install
	pub fn uninstall() -> bool {
		let mut previous_slot = PREVIOUS_HOOK.lock();
		let Some(previous) = previous_slot.take() else {
			return false;
		};

		drop(panic::take_hook());
		panic::set_hook(Box::new(move |info| (*previous)(info)));
		info!("last-chance handler uninstalled");
		true
	}

	/// Runs one unit of UI work under the main-thread trap.
	///
	/// Returns `None` when `f` panicked; the panic has then been handled.
	/// When the main-thread trap is not selected, `f` runs unguarded.
	pub fn guard<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
		if !self.traps.main_thread() {
			return Some(f());
		}

		GUARD_DEPTH.with(|d| d.set(d.get() + 1));
		let result = panic::catch_unwind(AssertUnwindSafe(f));
		GUARD_DEPTH.with(|d| d.set(d.get() - 1));

		let payload = match result {
			Ok(value) => return Some(value),
			Err(payload) => payload,
		};

		let exception = CAPTURED
			.with(|c| c.borrow_mut().take())
			.unwrap_or_else(|| ExceptionInfo::from_payload(payload.as_ref()));
		let event = ExceptionEvent::new(TrapKind::MainThread, exception, false);

		HANDLING.with(|h| h.set(true));
		let _ = panic::catch_unwind(AssertUnwindSafe(|| self.handle_main_thread(&event)));
		HANDLING.with(|h| h.set(false));

		None
	}

	/// Main-thread trap policy. Public so UI loops that catch panics on
	/// their own can route them here.
	pub fn handle_main_thread(&self, event: &ExceptionEvent) -> HandlerDecision {
		let subscriber = self.on_main_thread.read().clone();
		if let Some(subscriber) = subscriber {
			subscriber(event);
			return HandlerDecision::overridden();
		}

		error!(trap = "main_thread", exception = %event.exception, "unhandled panic");
		let mut decision = self.message_logged(event);

		let message = format!("{}\r\n\r\nPress Cancel to Exit", event.exception.display_message());
		if decision.force_terminate
			|| (!decision.suppress_default_ui && self.ask(&message) == PromptChoice::Cancel)
		{
			decision.force_terminate = true;
			self.terminate();
		}
		decision
	}

	/// Background trap policy.
	///
	/// When the runtime says the process is terminating, the user only gets
	/// an information prompt and termination follows regardless of what
	/// subscribers set.
	pub fn handle_background(&self, event: &ExceptionEvent) -> HandlerDecision {
		let subscriber = self.on_background_thread.read().clone();
		if let Some(subscriber) = subscriber {
			subscriber(event);
			return HandlerDecision::overridden();
		}

		error!(
			trap = "background_thread",
			exception = %event.exception,
			is_terminating = event.is_terminating(),
			"unhandled panic"
		);
		if let Some(backtrace) = &event.exception.backtrace {
			tracing::debug!(%backtrace, "panic backtrace");
		}
		let mut decision = self.message_logged(event);
		let text = event.exception.display_message();

		if event.is_terminating() {
			if !decision.suppress_default_ui {
				self.prompter.prompt(
					PROMPT_TITLE,
					&format!("{text}\r\n\r\nThe program is terminating."),
					PromptButtons::Info,
				);
			}
			decision.force_terminate = true;
			self.terminate();
			return decision;
		}

		let message = format!("{text}\r\n\r\nPress Cancel to Exit the program");
		if decision.force_terminate
			|| (!decision.suppress_default_ui && self.ask(&message) == PromptChoice::Cancel)
		{
			decision.force_terminate = true;
			self.terminate();
		}
		decision
	}

	fn on_panic(&self, info: &PanicHookInfo<'_>, previous: &PanicHook) {
		// A panic raised by a subscriber while a guarded panic is being
		// handled is dropped.
		if HANDLING.try_with(Cell::get).unwrap_or(false) {
			return;
		}

		if GUARD_DEPTH.try_with(Cell::get).unwrap_or(0) > 0 {
			let exception = ExceptionInfo::from_panic(info);
			let _ = CAPTURED.try_with(|c| *c.borrow_mut() = Some(exception));
			return;
		}

		if !self.traps.background_thread() {
			previous(info);
			return;
		}

		let is_terminating = cfg!(panic = "abort") || thread::current().id() == self.ui_thread;
		let event = ExceptionEvent::new(
			TrapKind::BackgroundThread,
			ExceptionInfo::from_panic(info),
			is_terminating,
		);
		self.handle_background(&event);
	}

	fn message_logged(&self, event: &ExceptionEvent) -> HandlerDecision {
		let subscribers = self.on_message_logged.read().clone();
		let mut logged = MessageLogged::new(event);
		for subscriber in subscribers {
			subscriber(&mut logged);
		}
		let mut decision = logged.decision();
		if event.is_terminating() {
			decision.force_terminate = true;
		}
		decision
	}

	fn ask(&self, message: &str) -> PromptChoice {
		self.prompter.prompt(PROMPT_TITLE, message, PromptButtons::OkCancel)
	}

	fn terminate(&self) {
		let subscribers = self.on_app_closing.read().clone();
		for subscriber in subscribers {
			subscriber();
		}
		info!("terminating after unhandled panic");
		self.terminator.terminate();
	}
}
