use std::{
	fmt::Display,
	io::{self, Write},
};

use log::{Level, LevelFilter, Log, Metadata, Record};
use owo_colors::OwoColorize;

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl StderrLogger {
	fn write_with_color(out: &mut impl Write, color: Color, string: impl Display) -> io::Result<()> {
		let string: &dyn Display = match color {
			Color::Default => &string,
			Color::Gray => &string.dimmed(),
			Color::BrightRed => &string.bright_red(),
			Color::BrightYellow => &string.bright_yellow(),
			Color::BrightBlue => &string.bright_blue(),
			Color::BrightCyan => &string.bright_cyan(),
			Color::BrightMagenta => &string.bright_magenta(),
		};
		write!(out, "{string}")
	}
}

impl Log for StderrLogger {
	fn enabled(&self, metadata: &Metadata<'_>) -> bool {
		metadata.level() <= log::max_level()
	}

	fn log(&self, record: &Record<'_>) {
		if !self.enabled(record.metadata()) {
			return;
		}
		let level = record.level();
		let mut out = io::stderr().lock();
		let color = match level {
			Level::Error => Color::BrightRed,
			Level::Warn => Color::BrightYellow,
			Level::Info => Color::BrightBlue,
			Level::Debug => Color::BrightCyan,
			Level::Trace => Color::BrightMagenta,
		};
		// nowhere to report a failing stderr
		let _ = Self::write_with_color(&mut out, color, format_args!("{level:5} "))
			.and_then(|()| {
				Self::write_with_color(&mut out, Color::Gray, format_args!("[{}] ", record.target()))
			})
			.and_then(|()| Self::write_with_color(&mut out, Color::Default, record.args()))
			.and_then(|()| writeln!(out));
	}

	fn flush(&self) {
		let _ = io::stderr().flush();
	}
}

/// Installs the logger. `-v` turns on debug output, `-vv` trace output.
pub(crate) fn init(verbosity: u8) -> Result<(), log::SetLoggerError> {
	log::set_max_level(match verbosity {
		0 => LevelFilter::Info,
		1 => LevelFilter::Debug,
		_ => LevelFilter::Trace,
	});
	log::set_logger(&LOGGER)
}

enum Color {
	Default,
	Gray,
	BrightRed,
	BrightYellow,
	BrightBlue,
	BrightCyan,
	BrightMagenta,
}
