// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-wide fan-out of log events to attached listeners.
//!
//! [`ListenerLayer`] turns every `tracing` event into a [`LogMessage`] and
//! hands it to each [`Listener`] in a [`ListenerRegistry`]. The log file and
//! the in-memory [`MessageBuffer`] are both listeners.

use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

thread_local! {
	static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// One log event as listeners see it.
#[derive(Debug, Clone)]
pub struct LogMessage {
	pub timestamp: DateTime<Utc>,
	pub level: Level,
	pub target: String,
	pub message: String,
	pub fields: Vec<(String, String)>,
}

impl LogMessage {
	pub fn new(level: Level, message: impl Into<String>) -> Self {
		Self {
			timestamp: Utc::now(),
			level,
			target: String::new(),
			message: message.into(),
			fields: Vec::new(),
		}
	}

	/// The message followed by ` key=value` for every structured field.
	pub fn text(&self) -> String {
		let mut text = self.message.clone();
		for (key, value) in &self.fields {
			text.push(' ');
			text.push_str(key);
			text.push('=');
			text.push_str(value);
		}
		text
	}
}

impl fmt::Display for LogMessage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:<5} {}", self.level.as_str(), self.text())
	}
}

pub trait Listener: Send + Sync {
	fn on_message(&self, message: &LogMessage);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listeners attached for the lifetime of the process, or until detached.
#[derive(Default)]
pub struct ListenerRegistry {
	next_id: AtomicU64,
	listeners: RwLock<Vec<(ListenerId, Arc<dyn Listener>)>>,
}

impl ListenerRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// The registry [`crate::logging::init`] wires into the subscriber.
	pub fn global() -> Arc<Self> {
		static GLOBAL: OnceLock<Arc<ListenerRegistry>> = OnceLock::new();
		Arc::clone(GLOBAL.get_or_init(|| Arc::new(ListenerRegistry::new())))
	}

	pub fn attach<L: Listener + 'static>(&self, listener: Arc<L>) -> ListenerId {
		let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
		let listener: Arc<dyn Listener> = listener;
		self.listeners.write().push((id, listener));
		id
	}

	/// Returns `false` if `id` was not attached.
	pub fn detach(&self, id: ListenerId) -> bool {
		let mut listeners = self.listeners.write();
		let before = listeners.len();
		listeners.retain(|(attached, _)| *attached != id);
		listeners.len() != before
	}

	pub fn is_attached(&self, id: ListenerId) -> bool {
		self.listeners.read().iter().any(|(attached, _)| *attached == id)
	}

	pub fn len(&self) -> usize {
		self.listeners.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.listeners.read().is_empty()
	}

	/// Delivers `message` to every listener in attach order.
	///
	/// Events raised by a listener while it handles a message are dropped.
	pub fn dispatch(&self, message: &LogMessage) {
		if DISPATCHING.try_with(Cell::get).unwrap_or(true) {
			return;
		}

		let listeners: Vec<Arc<dyn Listener>> = self
			.listeners
			.read()
			.iter()
			.map(|(_, listener)| Arc::clone(listener))
			.collect();
		if listeners.is_empty() {
			return;
		}

		struct Dispatching;
		impl Drop for Dispatching {
			fn drop(&mut self) {
				let _ = DISPATCHING.try_with(|d| d.set(false));
			}
		}

		DISPATCHING.with(|d| d.set(true));
		let _dispatching = Dispatching;
		for listener in listeners {
			listener.on_message(message);
		}
	}
}

/// Tracing layer feeding a [`ListenerRegistry`].
#[derive(Clone)]
pub struct ListenerLayer {
	registry: Arc<ListenerRegistry>,
}

impl ListenerLayer {
	pub fn new(registry: Arc<ListenerRegistry>) -> Self {
		Self { registry }
	}

	pub fn registry(&self) -> &Arc<ListenerRegistry> {
		&self.registry
	}
}

impl<S> Layer<S> for ListenerLayer
where
	S: Subscriber,
{
	fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
		if self.registry.is_empty() {
			return;
		}

		let metadata = event.metadata();
		let mut visitor = FieldVisitor::default();
		event.record(&mut visitor);

		let message = LogMessage {
			timestamp: Utc::now(),
			level: *metadata.level(),
			target: metadata.target().to_string(),
			message: visitor.message.unwrap_or_default(),
			fields: visitor.fields,
		};
		self.registry.dispatch(&message);
	}
}

#[derive(Default)]
struct FieldVisitor {
	message: Option<String>,
	fields: Vec<(String, String)>,
}

impl FieldVisitor {
	fn push(&mut self, field: &Field, value: String) {
		if field.name() == "message" {
			self.message = Some(value);
		} else {
			self.fields.push((field.name().to_string(), value));
		}
	}
}

impl Visit for FieldVisitor {
	fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
		self.push(field, format!("{value:?}"));
	}

	fn record_str(&mut self, field: &Field, value: &str) {
		self.push(field, value.to_string());
	}

	fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
		self.push(field, value.to_string());
	}
}

/// A message held by a [`MessageBuffer`].
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedMessage {
	pub message: String,
	pub time: DateTime<Utc>,
}

impl BufferedMessage {
	/// First line of the message, as a list row shows it.
	pub fn display(&self) -> &str {
		self.message.split(['\r', '\n']).next().unwrap_or_default()
	}
}

/// Bounded in-memory log, newest last. A `max_items` of zero means no limit.
pub struct MessageBuffer {
	max_items: usize,
	items: RwLock<VecDeque<BufferedMessage>>,
}

impl MessageBuffer {
	pub fn new(max_items: usize) -> Self {
		Self {
			max_items,
			items: RwLock::new(VecDeque::new()),
		}
	}

	pub fn max_items(&self) -> usize {
		self.max_items
	}

	pub fn push(&self, message: impl Into<String>) {
		let mut items = self.items.write();
		items.push_back(BufferedMessage {
			message: message.into(),
			time: Utc::now(),
		});
		if self.max_items > 0 {
			while items.len() > self.max_items {
				items.pop_front();
			}
		}
	}

	pub fn items(&self) -> Vec<BufferedMessage> {
		self.items.read().iter().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.items.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.read().is_empty()
	}

	pub fn clear(&self) {
		self.items.write().clear();
	}
}

impl Listener for MessageBuffer {
	fn on_message(&self, message: &LogMessage) {
		self.push(message.text());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::panic::AssertUnwindSafe;
	use std::sync::atomic::AtomicBool;
	use tracing_subscriber::layer::SubscriberExt;

	struct Reentrant;

	impl Listener for Reentrant {
		fn on_message(&self, _message: &LogMessage) {
			tracing::info!("logged from inside a listener");
		}
	}

	#[test]
	fn layer_fans_out_to_attached_listeners() {
		let registry = Arc::new(ListenerRegistry::new());
		let first = Arc::new(MessageBuffer::new(0));
		let second = Arc::new(MessageBuffer::new(0));
		registry.attach(Arc::clone(&first));
		let second_id = registry.attach(Arc::clone(&second));

		let subscriber = tracing_subscriber::registry().with(ListenerLayer::new(Arc::clone(&registry)));
		tracing::subscriber::with_default(subscriber, || {
			tracing::warn!(attempt = 3, "upload failed");
			assert!(registry.detach(second_id));
			tracing::info!("after detach");
		});

		let texts: Vec<String> = first.items().into_iter().map(|m| m.message).collect();
		assert_eq!(texts, vec!["upload failed attempt=3", "after detach"]);
		assert_eq!(second.len(), 1);
		assert!(!registry.is_attached(second_id));
		assert!(!registry.detach(second_id));
	}

	#[test]
	fn listener_logging_does_not_recurse() {
		let registry = Arc::new(ListenerRegistry::new());
		let buffer = Arc::new(MessageBuffer::new(0));
		registry.attach(Arc::new(Reentrant));
		registry.attach(Arc::clone(&buffer));

		let subscriber = tracing_subscriber::registry().with(ListenerLayer::new(Arc::clone(&registry)));
		tracing::subscriber::with_default(subscriber, || {
			tracing::info!("outer");
		});

		assert_eq!(buffer.len(), 1);
	}

	#[test]
	fn panicking_listener_does_not_silence_the_thread() {
		struct PanicsOnce(AtomicBool);

		impl Listener for PanicsOnce {
			fn on_message(&self, _message: &LogMessage) {
				if !self.0.swap(true, Ordering::SeqCst) {
					panic!("listener failed");
				}
			}
		}

		let registry = ListenerRegistry::new();
		let buffer = Arc::new(MessageBuffer::new(0));
		registry.attach(Arc::new(PanicsOnce(AtomicBool::new(false))));
		registry.attach(Arc::clone(&buffer));

		let first = std::panic::catch_unwind(AssertUnwindSafe(|| {
			registry.dispatch(&LogMessage::new(Level::INFO, "first"));
		}));
		assert!(first.is_err());
		assert!(buffer.is_empty());

		registry.dispatch(&LogMessage::new(Level::INFO, "second"));
		registry.dispatch(&LogMessage::new(Level::WARN, "third"));

		let texts: Vec<String> = buffer.items().into_iter().map(|m| m.message).collect();
		assert_eq!(texts, vec!["second", "third"]);
	}

	#[test]
	fn buffer_evicts_oldest() {
		let buffer = MessageBuffer::new(2);
		buffer.push("one");
		buffer.push("two");
		buffer.push("three");

		let items = buffer.items();
		assert_eq!(items.len(), 2);
		assert_eq!(items[0].message, "two");
		assert_eq!(items[1].message, "three");
	}

	#[test]
	fn display_is_first_line() {
		let buffer = MessageBuffer::new(0);
		buffer.push("summary line\r\ndetail one\ndetail two");

		let item = &buffer.items()[0];
		assert_eq!(item.display(), "summary line");
		assert!(item.message.contains("detail two"));
	}

	#[test]
	fn message_display_includes_level() {
		let mut message = LogMessage::new(Level::ERROR, "boom");
		message.fields.push(("code".into(), "7".into()));
		assert_eq!(message.to_string(), "ERROR boom code=7");
	}
}
