// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Plain-text application log kept on disk so it can ride along in reports.
//!
//! Three flavours exist: a single appended file, a daily file that switches
//! at midnight, and a rolling file backed up once it grows past a limit.
//! Every line carries a timestamp header. Write failures are reported once
//! on stderr and otherwise dropped; logging must never take the host down.

use std::fmt::Debug;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Local, NaiveDate, NaiveDateTime, Utc};
use loom_report_config::LogConfig;
use parking_lot::Mutex;

use crate::listener::{Listener, LogMessage};
use crate::lock::NamedLock;

const PLAIN_HEADER: &str = "%d-%m-%Y %H:%M:%S - ";
const DAILY_HEADER: &str = "%H:%M:%S - ";
const DAILY_NAME: &str = "%Y-%m-%d.log";

#[derive(Debug, Clone)]
pub struct LogFileOptions {
	pub utc: bool,
	pub auto_flush: bool,
	pub instance: Option<String>,
	/// Name of a [`NamedLock`] taken around every write and flush.
	pub lock_name: Option<String>,
}

impl Default for LogFileOptions {
	fn default() -> Self {
		Self {
			utc: false,
			auto_flush: true,
			instance: None,
			lock_name: None,
		}
	}
}

impl From<&LogConfig> for LogFileOptions {
	fn from(config: &LogConfig) -> Self {
		Self {
			utc: config.utc,
			auto_flush: config.auto_flush,
			instance: config.instance.clone(),
			lock_name: config.lock_name.clone(),
		}
	}
}

pub struct LogFile {
	inner: Mutex<Inner>,
	utc: bool,
	auto_flush: bool,
	lock: Option<NamedLock>,
	failure_reported: AtomicBool,
}

struct Inner {
	path: PathBuf,
	writer: BufWriter<File>,
	daily: Option<Daily>,
	instance: Option<String>,
}

struct Daily {
	folder: PathBuf,
	date: NaiveDate,
}

impl LogFile {
	/// Appends to `path`, creating it if absent.
	pub fn open(path: impl Into<PathBuf>, options: LogFileOptions) -> io::Result<Self> {
		Self::build(path.into(), None, options)
	}

	/// Writes `<folder>/yyyy-MM-dd.log`, moving to a new file on the first
	/// line written on a later date.
	pub fn daily(folder: impl Into<PathBuf>, options: LogFileOptions) -> io::Result<Self> {
		let folder = folder.into();
		fs::create_dir_all(&folder)?;
		let date = now(options.utc).date();
		let path = daily_path(&folder, date);
		Self::build(path, Some(Daily { folder, date }), options)
	}

	/// Moves an existing file larger than `max_size` bytes to `<stem>.bak`,
	/// replacing an older backup, then appends to a fresh `path`.
	pub fn rolling(path: impl Into<PathBuf>, max_size: u64, options: LogFileOptions) -> io::Result<Self> {
		let path = path.into();
		match fs::metadata(&path) {
			Ok(meta) if meta.len() > max_size => {
				let backup = path.with_extension("bak");
				remove_if_exists(&backup)?;
				fs::rename(&path, &backup)?;
			}
			Ok(_) => {}
			Err(e) if e.kind() == io::ErrorKind::NotFound => {}
			Err(e) => return Err(e),
		}
		Self::open(path, options)
	}

	/// Opens the log the configuration asks for, if any.
	pub fn from_config(config: &LogConfig) -> io::Result<Option<Self>> {
		let options = LogFileOptions::from(config);
		match (&config.file, &config.daily_folder, config.max_size_bytes) {
			(Some(file), _, Some(max_size)) => Self::rolling(file.clone(), max_size, options).map(Some),
			(Some(file), _, None) => Self::open(file.clone(), options).map(Some),
			(None, Some(folder), _) => Self::daily(folder.clone(), options).map(Some),
			(None, None, _) => Ok(None),
		}
	}

	fn build(path: PathBuf, daily: Option<Daily>, options: LogFileOptions) -> io::Result<Self> {
		let writer = BufWriter::new(open_append(&path)?);
		let lock = options.lock_name.as_deref().map(NamedLock::open).transpose()?;

		Ok(Self {
			inner: Mutex::new(Inner {
				path,
				writer,
				daily,
				instance: options.instance.filter(|i| !i.trim().is_empty()),
			}),
			utc: options.utc,
			auto_flush: options.auto_flush,
			lock,
			failure_reported: AtomicBool::new(false),
		})
	}

	/// The file currently written to.
	pub fn path(&self) -> PathBuf {
		self.inner.lock().path.clone()
	}

	pub fn instance(&self) -> Option<String> {
		self.inner.lock().instance.clone()
	}

	/// Sets the id written after the timestamp of every following line.
	pub fn set_instance(&self, instance: Option<String>) {
		self.inner.lock().instance = instance.filter(|i| !i.trim().is_empty());
	}

	pub fn uses_lock(&self) -> bool {
		self.lock.is_some()
	}

	pub fn write_line(&self, message: &str) {
		if let Err(e) = self.try_write_line(message) {
			self.report_failure(&e, message);
		}
	}

	/// Writes `message` followed by an indented `Debug` rendering of `value`.
	pub fn dump<T: Debug + ?Sized>(&self, message: &str, value: &T) {
		self.write_line(&render_dump(message, value));
	}

	/// Only needed when `auto_flush` is off.
	pub fn flush(&self) {
		let result = (|| -> io::Result<()> {
			let _held = self.lock.as_ref().map(NamedLock::acquire).transpose()?;
			self.inner.lock().writer.flush()
		})();
		if let Err(e) = result {
			self.report_failure(&e, "failed to flush log file");
		}
	}

	fn try_write_line(&self, message: &str) -> io::Result<()> {
		let _held = self.lock.as_ref().map(NamedLock::acquire).transpose()?;
		let mut inner = self.inner.lock();

		let now = now(self.utc);
		inner.roll_daily(now.date())?;

		let format = if inner.daily.is_some() { DAILY_HEADER } else { PLAIN_HEADER };
		let mut line = now.format(format).to_string();
		if let Some(instance) = &inner.instance {
			line.push_str(instance);
			line.push_str(" - ");
		}
		line.push_str(message);
		writeln!(inner.writer, "{line}")?;

		if self.auto_flush {
			inner.writer.flush()?;
		}
		Ok(())
	}

	fn report_failure(&self, error: &io::Error, message: &str) {
		if self.failure_reported.swap(true, Ordering::Relaxed) {
			return;
		}
		let _ = writeln!(
			io::stderr(),
			"Failed to log message: {error}\n\nOriginal Message:\n{message}"
		);
	}
}

impl Inner {
	fn roll_daily(&mut self, today: NaiveDate) -> io::Result<()> {
		let Some(daily) = &mut self.daily else {
			return Ok(());
		};
		if daily.date == today {
			return Ok(());
		}

		self.writer.flush()?;
		let path = daily_path(&daily.folder, today);
		self.writer = BufWriter::new(open_append(&path)?);
		self.path = path;
		daily.date = today;
		Ok(())
	}
}

impl Drop for LogFile {
	fn drop(&mut self) {
		let _ = self.inner.get_mut().writer.flush();
	}
}

impl Listener for LogFile {
	fn on_message(&self, message: &LogMessage) {
		self.write_line(&message.to_string());
	}
}

fn now(utc: bool) -> NaiveDateTime {
	if utc {
		Utc::now().naive_utc()
	} else {
		Local::now().naive_local()
	}
}

fn daily_path(folder: &Path, date: NaiveDate) -> PathBuf {
	folder.join(date.format(DAILY_NAME).to_string())
}

fn open_append(path: &Path) -> io::Result<File> {
	OpenOptions::new().create(true).append(true).open(path)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
	match fs::remove_file(path) {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(e),
	}
}

fn render_dump<T: Debug + ?Sized>(message: &str, value: &T) -> String {
	let mut out = String::from(message);
	for line in format!("{value:#?}").lines() {
		out.push('\n');
		out.push_str("    ");
		out.push_str(line);
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use regex::Regex;
	use tempfile::TempDir;

	fn read(path: &Path) -> String {
		fs::read_to_string(path).unwrap()
	}

	#[test]
	fn plain_lines_carry_date_header() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("app.log");
		let log = LogFile::open(&path, LogFileOptions::default()).unwrap();

		log.write_line("started");
		log.set_instance(Some("worker-2".into()));
		log.write_line("second");

		let text = read(&path);
		let lines: Vec<&str> = text.lines().collect();
		let plain = Regex::new(r"^\d{2}-\d{2}-\d{4} \d{2}:\d{2}:\d{2} - started$").unwrap();
		let tagged = Regex::new(r"^\d{2}-\d{2}-\d{4} \d{2}:\d{2}:\d{2} - worker-2 - second$").unwrap();
		assert!(plain.is_match(lines[0]), "{}", lines[0]);
		assert!(tagged.is_match(lines[1]), "{}", lines[1]);
	}

	#[test]
	fn appends_to_existing_file() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("app.log");
		fs::write(&path, "earlier\n").unwrap();

		let log = LogFile::open(&path, LogFileOptions::default()).unwrap();
		log.write_line("later");

		let text = read(&path);
		assert!(text.starts_with("earlier\n"));
		assert!(text.trim_end().ends_with(" - later"));
	}

	#[test]
	fn blank_instance_is_ignored() {
		let dir = TempDir::new().unwrap();
		let options = LogFileOptions {
			instance: Some("   ".into()),
			..Default::default()
		};
		let log = LogFile::open(dir.path().join("a.log"), options).unwrap();
		assert_eq!(log.instance(), None);
	}

	#[test]
	fn daily_log_uses_dated_name_and_time_header() {
		let dir = TempDir::new().unwrap();
		let options = LogFileOptions {
			utc: true,
			..Default::default()
		};
		let log = LogFile::daily(dir.path().join("logs"), options).unwrap();
		log.write_line("tick");

		let expected = dir
			.path()
			.join("logs")
			.join(Utc::now().date_naive().format("%Y-%m-%d.log").to_string());
		assert_eq!(log.path(), expected);
		let header = Regex::new(r"^\d{2}:\d{2}:\d{2} - tick$").unwrap();
		assert!(header.is_match(read(&expected).trim_end()));
	}

	#[test]
	fn daily_log_switches_file_on_new_date() {
		let dir = TempDir::new().unwrap();
		let options = LogFileOptions {
			utc: true,
			..Default::default()
		};
		let log = LogFile::daily(dir.path(), options).unwrap();
		let today = log.path();

		{
			let mut inner = log.inner.lock();
			let yesterday = Utc::now().date_naive().pred_opt().unwrap();
			let stale = daily_path(dir.path(), yesterday);
			inner.writer = BufWriter::new(open_append(&stale).unwrap());
			inner.path = stale;
			if let Some(daily) = &mut inner.daily {
				daily.date = yesterday;
			}
		}

		log.write_line("after midnight");
		assert_eq!(log.path(), today);
		assert!(read(&today).contains("after midnight"));
	}

	#[test]
	fn rolling_log_backs_up_oversized_file() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("app.log");
		let backup = dir.path().join("app.bak");
		fs::write(&backup, "ancient").unwrap();
		fs::write(&path, "x".repeat(64)).unwrap();

		let log = LogFile::rolling(&path, 32, LogFileOptions::default()).unwrap();
		log.write_line("fresh");

		assert_eq!(read(&backup), "x".repeat(64));
		assert!(read(&path).trim_end().ends_with(" - fresh"));
	}

	#[test]
	fn rolling_log_keeps_small_file() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("app.log");
		fs::write(&path, "small\n").unwrap();

		let log = LogFile::rolling(&path, 1024, LogFileOptions::default()).unwrap();
		log.write_line("more");

		assert!(!dir.path().join("app.bak").exists());
		assert!(read(&path).starts_with("small\n"));
	}

	#[test]
	fn manual_flush_without_auto_flush() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("app.log");
		let options = LogFileOptions {
			auto_flush: false,
			..Default::default()
		};
		let log = LogFile::open(&path, options).unwrap();
		log.write_line("buffered");
		assert_eq!(read(&path), "");

		log.flush();
		assert!(read(&path).contains("buffered"));
	}

	#[test]
	fn dump_indents_debug_output() {
		#[derive(Debug)]
		#[allow(dead_code)]
		struct Settings {
			retries: u32,
			host: &'static str,
		}

		let rendered = render_dump(
			"settings",
			&Settings {
				retries: 3,
				host: "smtp.local",
			},
		);
		assert_eq!(
			rendered,
			"settings\n    Settings {\n        retries: 3,\n        host: \"smtp.local\",\n    }"
		);
	}

	#[test]
	fn config_without_targets_opens_nothing() {
		assert!(LogFile::from_config(&LogConfig::default()).unwrap().is_none());
	}

	#[test]
	fn write_line_with_lock() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("locked.log");
		let options = LogFileOptions {
			lock_name: Some(format!("loom-report-test-{}", std::process::id())),
			..Default::default()
		};
		let log = LogFile::open(&path, options).unwrap();
		assert!(log.uses_lock());
		log.write_line("guarded");
		assert!(read(&path).contains("guarded"));
	}
}
