// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Diagnostic text gathered from the application's open windows.

use std::sync::Arc;

use loom_report_core::ArchiveWriter;
use tracing::warn;

use crate::sender::{ArchiveHook, HookError};

/// Archive entry written by [`InfoGatherer`] when used as a hook.
pub const WINDOWS_ENTRY: &str = "windows.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
	Window,
	/// Hosts child windows; its children are listed right after it.
	Container,
	/// Listed under its container, never on its own.
	Child,
}

impl WindowKind {
	fn label(self) -> &'static str {
		match self {
			WindowKind::Window => "Window",
			WindowKind::Container => "Container",
			WindowKind::Child => "Child",
		}
	}
}

/// Implemented by windows that can describe themselves in a report.
pub trait InfoGathering {
	fn title(&self) -> String;

	fn kind(&self) -> WindowKind {
		WindowKind::Window
	}

	fn type_name(&self) -> &'static str {
		std::any::type_name::<Self>()
	}

	/// Extra state worth reporting. `Ok(None)` or blank text adds nothing.
	fn gather_info(&self) -> Result<Option<String>, HookError> {
		Ok(None)
	}

	fn children(&self) -> Vec<&dyn InfoGathering> {
		Vec::new()
	}
}

type WindowSource = dyn Fn() -> Vec<Arc<dyn InfoGathering + Send + Sync>> + Send + Sync;

/// Renders open windows, and as an [`ArchiveHook`] writes the rendering to
/// [`WINDOWS_ENTRY`].
pub struct InfoGatherer {
	windows: Box<WindowSource>,
}

impl InfoGatherer {
	/// `windows` lists the open windows in opening order, so the active one
	/// is last.
	pub fn new(
		windows: impl Fn() -> Vec<Arc<dyn InfoGathering + Send + Sync>> + Send + Sync + 'static,
	) -> Self {
		Self {
			windows: Box::new(windows),
		}
	}

	pub fn gather_open(&self) -> String {
		let windows = (self.windows)();
		let refs: Vec<&dyn InfoGathering> = windows
			.iter()
			.map(|w| w.as_ref() as &dyn InfoGathering)
			.collect();
		Self::gather(&refs)
	}

	/// One line per window, active window first. Multi-line info follows
	/// its window indented by four spaces.
	pub fn gather(windows: &[&dyn InfoGathering]) -> String {
		let mut out = String::new();
		for window in windows.iter().rev() {
			if window.kind() == WindowKind::Child {
				continue;
			}
			render_window(&mut out, *window);
			if window.kind() == WindowKind::Container {
				for child in window.children() {
					render_window(&mut out, child);
				}
			}
		}
		out.trim_end_matches(['\r', '\n']).to_string()
	}
}

impl ArchiveHook for InfoGatherer {
	fn add_files(&self, writer: &mut ArchiveWriter) -> Result<(), HookError> {
		writer.add_string(WINDOWS_ENTRY, &self.gather_open());
		Ok(())
	}
}

fn render_window(out: &mut String, window: &dyn InfoGathering) {
	out.push_str(&format!(
		"{} [{}] '{}'",
		window.kind().label(),
		window.type_name(),
		window.title()
	));

	let info = match window.gather_info() {
		Ok(info) => info,
		Err(e) => {
			warn!(window = %window.title(), error = %e, "window failed to gather info");
			Some(format!("Exception: {e}"))
		}
	};

	if let Some(info) = info.filter(|i| !i.trim().is_empty()) {
		if info.contains('\n') {
			out.push('\n');
			out.push_str("    ");
			out.push_str(&info.replace('\n', "\n    "));
		} else {
			out.push_str(" - ");
			out.push_str(&info);
		}
	}
	out.push('\n');
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Editor {
		title: &'static str,
		info: Result<Option<&'static str>, &'static str>,
	}

	impl InfoGathering for Editor {
		fn title(&self) -> String {
			self.title.to_string()
		}

		fn type_name(&self) -> &'static str {
			"app::Editor"
		}

		fn gather_info(&self) -> Result<Option<String>, HookError> {
			match self.info {
				Ok(info) => Ok(info.map(str::to_string)),
				Err(message) => Err(message.into()),
			}
		}
	}

	struct Workspace {
		documents: Vec<Editor>,
	}

	impl InfoGathering for Workspace {
		fn title(&self) -> String {
			"Workspace".into()
		}

		fn kind(&self) -> WindowKind {
			WindowKind::Container
		}

		fn type_name(&self) -> &'static str {
			"app::Workspace"
		}

		fn children(&self) -> Vec<&dyn InfoGathering> {
			self.documents.iter().map(|d| d as &dyn InfoGathering).collect()
		}
	}

	struct Orphan;

	impl InfoGathering for Orphan {
		fn title(&self) -> String {
			"orphan".into()
		}

		fn kind(&self) -> WindowKind {
			WindowKind::Child
		}
	}

	fn editor(title: &'static str, info: Result<Option<&'static str>, &'static str>) -> Editor {
		Editor { title, info }
	}

	#[test]
	fn active_window_first_with_inline_info() {
		let first = editor("Settings", Ok(None));
		let active = editor("Report", Ok(Some("3 rows selected")));

		let text = InfoGatherer::gather(&[&first, &active]);
		assert_eq!(
			text,
			"Window [app::Editor] 'Report' - 3 rows selected\nWindow [app::Editor] 'Settings'"
		);
	}

	#[test]
	fn multi_line_info_is_indented() {
		let window = editor("Report", Ok(Some("row 1\r\nrow 2\nrow 3")));

		let text = InfoGatherer::gather(&[&window]);
		assert_eq!(
			text,
			"Window [app::Editor] 'Report'\n    row 1\r\n    row 2\n    row 3"
		);
	}

	#[test]
	fn failing_window_reports_exception() {
		let window = editor("Broken", Err("grid disposed"));
		let text = InfoGatherer::gather(&[&window]);
		assert_eq!(text, "Window [app::Editor] 'Broken' - Exception: grid disposed");
	}

	#[test]
	fn container_lists_children_and_skips_loose_children() {
		let workspace = Workspace {
			documents: vec![editor("a.txt", Ok(Some("dirty"))), editor("b.txt", Ok(None))],
		};

		let text = InfoGatherer::gather(&[&workspace, &Orphan]);
		assert_eq!(
			text,
			"Container [app::Workspace] 'Workspace'\n\
			 Window [app::Editor] 'a.txt' - dirty\n\
			 Window [app::Editor] 'b.txt'"
		);
	}

	#[test]
	fn hook_writes_windows_entry() {
		let gatherer = InfoGatherer::new(|| {
			vec![Arc::new(editor("Main", Ok(Some("idle")))) as Arc<dyn InfoGathering + Send + Sync>]
		});

		let mut writer = loom_report_core::begin_archive();
		gatherer.add_files(&mut writer).unwrap();
		let archive = writer.finish().unwrap();

		let text = archive.read_entry(WINDOWS_ENTRY).unwrap().unwrap();
		assert_eq!(text, b"Window [app::Editor] 'Main' - idle");
	}
}
