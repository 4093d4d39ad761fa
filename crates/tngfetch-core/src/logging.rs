//! Logging setup: templated console output, indicatif integration and an
//! optional developer log file.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use indicatif::MultiProgress;

/// Set once the installed console logger prints `error!` records.
static CONSOLE_ERRORS: AtomicBool = AtomicBool::new(false);

/// Whether `error!` records reach the console. False before [`init_logging`]
/// and when only the developer log is active.
pub fn console_logs_errors() -> bool {
    CONSOLE_ERRORS.load(Ordering::Relaxed)
}

fn prints_errors(main: Option<&env_logger::Logger>) -> bool {
    main.is_some_and(|m| m.filter() >= log::LevelFilter::Error)
}

/// Default console line template.
pub const DEFAULT_FORMAT: &str = "[{level}] {message}";

/// Console stream for the main logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogStream {
    Stdout,
    #[default]
    Stderr,
}

/// Resolved logging options, built by the CLI from the settings document.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Main console logger on/off
    pub enabled: bool,
    pub level: log::LevelFilter,
    /// Line template, see [`render_line`]
    pub format: String,
    pub stream: LogStream,
    /// Directory for the developer log; `None` disables it
    pub developer_dir: Option<PathBuf>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            level: log::LevelFilter::Info,
            format: DEFAULT_FORMAT.to_string(),
            stream: LogStream::Stderr,
            developer_dir: None,
        }
    }
}

/// ANSI color code and padded label for a log level.
fn level_style(level: log::Level, color: bool) -> (&'static str, &'static str, &'static str) {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !color {
        return ("", label, "");
    }
    let ansi = match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    };
    (ansi, label, "\x1b[0m")
}

/// Expand a line template.
///
/// Recognized placeholders: `{level}`, `{target}`, `{message}`, `{time}`.
/// Anything else is copied through verbatim.
pub fn render_line(template: &str, level: &str, target: &str, message: &str) -> String {
    let mut line = template.replace("{level}", level).replace("{target}", target);
    if line.contains("{time}") {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        line = line.replace("{time}", &now);
    }
    // message last so braces inside the message are never expanded
    line.replace("{message}", message)
}

/// Logger that renders the configured template, prints through indicatif
/// `MultiProgress` when bars are active, and mirrors everything at debug level
/// into the developer log file when one is open.
pub struct TngLogger {
    main: Option<env_logger::Logger>,
    format: String,
    stream: LogStream,
    multi: Option<MultiProgress>,
    developer: Option<Mutex<File>>,
}

impl TngLogger {
    fn emit(&self, line: &str) {
        let write = || match self.stream {
            LogStream::Stdout => println!("{line}"),
            LogStream::Stderr => eprintln!("{line}"),
        };
        match &self.multi {
            Some(multi) => multi.suspend(write),
            None => write(),
        }
    }
}

impl log::Log for TngLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        let main = self.main.as_ref().is_some_and(|m| m.enabled(metadata));
        let dev = self.developer.is_some() && metadata.level() <= log::Level::Debug;
        main || dev
    }

    fn log(&self, record: &log::Record) {
        if let Some(main) = &self.main {
            if main.matches(record) {
                // color only on the TTY path (multi is present only then)
                let (pre, label, post) = level_style(record.level(), self.multi.is_some());
                let level = format!("{pre}{}{post}", label.trim_end());
                let message = record.args().to_string();
                self.emit(&render_line(&self.format, &level, record.target(), &message));
            }
        }

        if let Some(file) = &self.developer {
            if record.level() <= log::Level::Debug {
                let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                let thread = std::thread::current();
                if let Ok(mut f) = file.lock() {
                    let _ = writeln!(
                        f,
                        "{now} [{}] {} [thread={}]: {}",
                        record.level(),
                        record.target(),
                        thread.name().unwrap_or("unnamed"),
                        record.args()
                    );
                }
            }
        }
    }

    fn flush(&self) {
        if let Some(main) = &self.main {
            main.flush();
        }
        if let Some(file) = &self.developer {
            if let Ok(mut f) = file.lock() {
                let _ = f.flush();
            }
        }
    }
}

/// Open a fresh developer log file named after the current local time.
fn open_developer_log(dir: &Path) -> io::Result<(File, PathBuf)> {
    std::fs::create_dir_all(dir)?;
    let name = chrono::Local::now().format("%m-%d-%y_%H-%M-%S.log").to_string();
    let path = dir.join(name);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    Ok((file, path))
}

/// Install the process logger.
///
/// `debug` forces the main level to debug. `RUST_LOG`, when set, overrides the
/// configured level. Pass `multi` only in TTY mode so log lines don't tear
/// progress bars. Returns the developer log path when one was opened.
pub fn init_logging(
    opts: &LogOptions,
    debug: bool,
    multi: Option<&MultiProgress>,
) -> io::Result<Option<PathBuf>> {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        opts.level
    };

    let main = opts.enabled.then(|| {
        let default_filter = level.as_str().to_ascii_lowercase();
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
            .build()
    });

    let (developer, dev_path) = match &opts.developer_dir {
        Some(dir) => {
            let (file, path) = open_developer_log(dir)?;
            (Some(Mutex::new(file)), Some(path))
        }
        None => (None, None),
    };

    let main_max = main
        .as_ref()
        .map_or(log::LevelFilter::Off, env_logger::Logger::filter);
    let max_level = if developer.is_some() {
        main_max.max(log::LevelFilter::Debug)
    } else {
        main_max
    };

    let console_errors = prints_errors(main.as_ref());
    let logger = TngLogger {
        main,
        format: opts.format.clone(),
        stream: opts.stream,
        multi: multi.cloned(),
        developer,
    };
    log::set_boxed_logger(Box::new(logger)).map_err(io::Error::other)?;
    log::set_max_level(max_level);
    CONSOLE_ERRORS.store(console_errors, Ordering::Relaxed);

    Ok(dev_path)
}
