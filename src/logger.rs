// src/logger.rs
// Console output: colored level badges, optional timestamps, startup banner

use chrono::{DateTime, Local};
use colored::*;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Http,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogLevel::Http => write!(f, "{}", " HTTP ".on_blue().bold().white()),
            LogLevel::Info => write!(f, "{}", " INFO ".on_magenta().bold().white()),
            LogLevel::Warn => write!(f, "{}", " WARN ".on_yellow().bold().black()),
            LogLevel::Error => write!(f, "{}", " ERROR ".on_red().bold().white()),
        }
    }
}

pub struct Logger {
    /// Suppresses `Http` and `Info` lines. Warnings and errors always print.
    pub silent: bool,
    pub enable_timestamps: bool,
}

impl Logger {
    pub const fn new() -> Self {
        Self {
            silent: false,
            enable_timestamps: true,
        }
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_timestamps(mut self, enable: bool) -> Self {
        self.enable_timestamps = enable;
        self
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        match level {
            LogLevel::Http | LogLevel::Info => !self.silent,
            LogLevel::Warn | LogLevel::Error => true,
        }
    }

    fn format_timestamp(&self) -> String {
        if self.enable_timestamps {
            let now: DateTime<Local> = Local::now();
            format!("{} ", now.format("%Y-%m-%d %H:%M:%S").to_string().dimmed())
        } else {
            String::new()
        }
    }

    fn format_line(&self, level: LogLevel, message: &str) -> String {
        format!("{}{} {}", self.format_timestamp(), level, message)
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        if !self.is_enabled(level) {
            return;
        }

        let line = self.format_line(level, message);
        match level {
            LogLevel::Warn | LogLevel::Error => eprintln!("{}", line),
            LogLevel::Http | LogLevel::Info => println!("{}", line),
        }
    }

    /// One access line: client, request line, status and latency.
    pub fn http(&self, ip: &str, method: &str, path: &str, status: u16, response_time: u128) {
        if !self.is_enabled(LogLevel::Http) {
            return;
        }

        let request = format!("{} {}", method, path).cyan();
        let status_colored = if status < 400 {
            status.to_string().green()
        } else {
            status.to_string().red()
        };

        self.log(
            LogLevel::Http,
            &format!(
                "{} {} - {} in {} ms",
                ip.yellow(),
                request,
                status_colored,
                response_time
            ),
        );
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    pub fn startup_info(&self, name: &str, version: &str) {
        self.info(&format!("Starting {} v{}", name.bold(), version.bold()));
    }

    /// Where the server can be reached. Boxed when stdout is a terminal.
    pub fn server_info(&self, local_url: &str, network_url: Option<&str>) {
        if self.silent {
            return;
        }

        if !atty::is(atty::Stream::Stdout) {
            self.info(&format!("Accepting connections at {}", local_url));
            return;
        }

        let prefix = if network_url.is_some() { "- " } else { "" };
        let space = if network_url.is_some() { "    " } else { "  " };
        let mut message = format!(
            "{}\n\n{}{}{}{}",
            "Serving!".green().bold(),
            "Local:".bold(),
            space,
            prefix,
            local_url.bright_cyan()
        );

        if let Some(network) = network_url {
            message += &format!("\n{}  {}", "- Network:".bold(), network.bright_cyan());
        }

        print_boxed(&message);
    }

    pub fn shutdown_message(&self) {
        self.info("Gracefully shutting down. Please wait...");
    }

    pub fn force_shutdown_message(&self) {
        self.warn("Force-closing all open sockets...");
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

fn print_boxed(message: &str) {
    for line in boxed_lines(message) {
        println!("{}", line);
    }
    println!();
}

/// Frame `message` in a box, centring each line. Width ignores ANSI escapes.
fn boxed_lines(message: &str) -> Vec<String> {
    let lines: Vec<&str> = message.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let max_width = lines
        .iter()
        .map(|line| strip_ansi_codes(line).chars().count())
        .max()
        .unwrap_or(0);
    let box_width = max_width + 4;

    let mut framed = Vec::with_capacity(lines.len() + 4);
    framed.push(format!("┌{}┐", "─".repeat(box_width)));
    framed.push(format!("│{}│", " ".repeat(box_width)));
    for line in lines {
        let visible = strip_ansi_codes(line).chars().count();
        let left = (box_width - visible) / 2;
        let right = box_width - visible - left;
        framed.push(format!("│{}{}{}│", " ".repeat(left), line, " ".repeat(right)));
    }
    framed.push(format!("│{}│", " ".repeat(box_width)));
    framed.push(format!("└{}┘", "─".repeat(box_width)));
    framed
}

fn strip_ansi_codes(s: &str) -> String {
    let mut result = String::new();
    let mut in_escape = false;
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            in_escape = true;
            continue;
        }

        if in_escape {
            if ch.is_ascii_alphabetic() {
                in_escape = false;
            }
            continue;
        }

        result.push(ch);
    }

    result
}

static GLOBAL_LOGGER: OnceLock<Logger> = OnceLock::new();
static DEFAULT_LOGGER: Logger = Logger::new();

/// Install the process-wide logger. Only the first call has an effect.
pub fn init_logger(silent: bool, enable_timestamps: bool) {
    let _ = GLOBAL_LOGGER.set(
        Logger::new()
            .with_silent(silent)
            .with_timestamps(enable_timestamps),
    );
}

pub fn get_logger() -> &'static Logger {
    GLOBAL_LOGGER.get().unwrap_or(&DEFAULT_LOGGER)
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::get_logger().info(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::get_logger().warn(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logger::get_logger().error(&format!($($arg)*))
    };
}
