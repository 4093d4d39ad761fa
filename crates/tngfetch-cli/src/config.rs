//! Settings document (YAML): loading, location and in-place API key updates

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tngfetch_core::{DisplayOptions, LogOptions, LogStream};

/// Environment variable naming an explicit settings file.
pub const CONFIG_ENV: &str = "TNGFETCH_CONFIG";

/// Settings file looked up in the current directory.
pub const LOCAL_FILE: &str = "tngfetch.yaml";

/// Document written by `tngfetch init`.
pub const DEFAULT_DOCUMENT: &str = include_str!("../default_config.yaml");

/// Settings document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub system: SystemSettings,
    pub tng: TngSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    pub logging: LoggingSettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub main: MainLogSettings,
    pub developer: DeveloperLogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MainLogSettings {
    pub enabled: bool,
    pub format: String,
    pub level: LogLevel,
    pub stream: StreamSetting,
}

impl Default for MainLogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            format: tngfetch_core::logging::DEFAULT_FORMAT.to_string(),
            level: LogLevel::Info,
            stream: StreamSetting::Stderr,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeveloperLogSettings {
    pub enabled: bool,
    pub output_directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub spinners: bool,
    pub progress_bars: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            spinners: true,
            progress_bars: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TngSettings {
    pub base_url: String,
    pub api_key: String,
}

impl Default for TngSettings {
    fn default() -> Self {
        Self {
            base_url: tngfetch_api::DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
        }
    }
}

/// Console log level (`DEBUG`, `INFO`, `WARNING`/`WARN`, `ERROR`; any case)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, String> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            _ => Err(format!(
                "unknown log level '{s}' (expected DEBUG, INFO, WARNING or ERROR)"
            )),
        }
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Self::Debug,
            LogLevel::Info => Self::Info,
            LogLevel::Warning => Self::Warn,
            LogLevel::Error => Self::Error,
        }
    }
}

/// Console stream (`STDOUT` or `STDERR`; any case)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum StreamSetting {
    Stdout,
    Stderr,
}

impl TryFrom<String> for StreamSetting {
    type Error = String;

    fn try_from(s: String) -> Result<Self, String> {
        match s.to_ascii_uppercase().as_str() {
            "STDOUT" => Ok(Self::Stdout),
            "STDERR" => Ok(Self::Stderr),
            _ => Err(format!("unknown stream '{s}' (expected STDOUT or STDERR)")),
        }
    }
}

/// Settings document errors
#[derive(Debug)]
pub enum ConfigError {
    NotFound { searched: Vec<PathBuf> },
    Parse { path: PathBuf, message: String },
    Io { path: PathBuf, source: std::io::Error },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { searched } => {
                write!(f, "no settings file found (searched:")?;
                for p in searched {
                    write!(f, " {}", p.display())?;
                }
                write!(f, "); run `tngfetch init` to create one")
            }
            Self::Parse { path, message } => {
                write!(f, "cannot parse {}: {message}", path.display())
            }
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::NotFound { .. } | Self::Parse { .. } => None,
        }
    }
}

/// `<user config dir>/config.yaml`
fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "tngfetch").map(|d| d.config_dir().join("config.yaml"))
}

/// Candidate settings paths, in search order.
///
/// An explicit path is the only candidate when given.
fn candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    if let Some(p) = explicit {
        return vec![p.to_path_buf()];
    }
    let mut paths = Vec::new();
    if let Some(p) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        paths.push(PathBuf::from(p));
    }
    paths.push(PathBuf::from(LOCAL_FILE));
    paths.extend(user_config_path());
    paths
}

/// Find the settings document.
pub fn locate(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let searched = candidates(explicit);
    if let Some(p) = searched.iter().find(|p| p.is_file()) {
        return Ok(p.clone());
    }
    Err(ConfigError::NotFound { searched })
}

/// Where `init` writes a new document.
pub fn default_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    if let Some(p) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(p);
    }
    user_config_path().unwrap_or_else(|| PathBuf::from(LOCAL_FILE))
}

/// Expand `${VAR}` from the environment; unset variables become empty.
fn expand_env_var(s: &str) -> String {
    match s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        Some(var) => std::env::var(var).unwrap_or_default(),
        None => s.to_string(),
    }
}

impl Settings {
    /// Locate and parse the settings document.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        let path = locate(explicit)?;
        let settings = Self::from_file(&path)?;
        Ok((settings, path))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse a document; an empty document yields the defaults.
    pub fn parse(content: &str) -> Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut settings: Settings = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        settings.tng.api_key = expand_env_var(&settings.tng.api_key);
        Ok(settings)
    }

    /// API key, `""` when unset.
    pub fn api_key(&self) -> &str {
        &self.tng.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.tng.base_url
    }

    /// Developer log directory, if that log is enabled and has one.
    pub fn developer_dir(&self) -> Option<&Path> {
        let dev = &self.system.logging.developer;
        if dev.enabled {
            dev.output_directory.as_deref()
        } else {
            None
        }
    }

    /// Developer log enabled without an output directory.
    pub fn developer_misconfigured(&self) -> bool {
        let dev = &self.system.logging.developer;
        dev.enabled && dev.output_directory.is_none()
    }

    pub fn log_options(&self) -> LogOptions {
        let main = &self.system.logging.main;
        LogOptions {
            enabled: main.enabled,
            level: main.level.into(),
            format: main.format.clone(),
            stream: match main.stream {
                StreamSetting::Stdout => LogStream::Stdout,
                StreamSetting::Stderr => LogStream::Stderr,
            },
            developer_dir: self.developer_dir().map(Path::to_path_buf),
        }
    }

    pub fn display_options(&self) -> DisplayOptions {
        DisplayOptions {
            spinners: self.system.display.spinners,
            progress_bars: self.system.display.progress_bars,
        }
    }
}

/// Rewrite `tng.api_key` in the document at `path`, keeping every other key.
pub fn set_api_key(path: &Path, key: &str) -> Result<(), ConfigError> {
    use serde_yaml::{Mapping, Value};

    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parse_err = |e: serde_yaml::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let content = std::fs::read_to_string(path).map_err(io_err)?;
    let mut doc: Value = if content.trim().is_empty() {
        Value::Mapping(Mapping::new())
    } else {
        serde_yaml::from_str(&content).map_err(parse_err)?
    };

    let Value::Mapping(root) = &mut doc else {
        return Err(ConfigError::Parse {
            path: path.to_path_buf(),
            message: "top level is not a mapping".into(),
        });
    };
    if !root.get("tng").is_some_and(Value::is_mapping) {
        root.insert(Value::from("tng"), Value::Mapping(Mapping::new()));
    }
    if let Some(Value::Mapping(tng)) = root.get_mut("tng") {
        tng.insert(Value::from("api_key"), Value::from(key));
    }

    let out = serde_yaml::to_string(&doc).map_err(parse_err)?;
    std::fs::write(path, out).map_err(io_err)?;
    Ok(())
}

/// Write the default document; refuses to overwrite unless `force`.
pub fn write_default(path: &Path, force: bool) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if path.exists() && !force {
        return Err(io_err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "already exists (use --force to overwrite)",
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, DEFAULT_DOCUMENT).map_err(io_err)
}

/// `abcd…wxyz` style display of a secret.
pub fn mask_key(key: &str) -> String {
    let n = key.chars().count();
    if n == 0 {
        "not set".to_string()
    } else if n <= 8 {
        "*".repeat(n)
    } else {
        let head: String = key.chars().take(4).collect();
        let tail: String = key.chars().skip(n - 4).collect();
        format!("{head}…{tail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_document_matches_defaults() {
        let s = Settings::parse(DEFAULT_DOCUMENT).unwrap();
        assert!(s.system.logging.main.enabled);
        assert_eq!(s.system.logging.main.format, "[{level}] {message}");
        assert_eq!(s.system.logging.main.level, LogLevel::Info);
        assert_eq!(s.system.logging.main.stream, StreamSetting::Stderr);
        assert!(!s.system.logging.developer.enabled);
        assert!(s.system.display.spinners);
        assert_eq!(s.base_url(), "https://www.tng-project.org/api");
        assert_eq!(s.api_key(), "");
    }

    #[test]
    fn missing_keys_take_defaults_and_unknown_keys_are_ignored() {
        let s = Settings::parse(
            "tng:\n  api_key: abc\n  colour: blue\nextra:\n  anything: 1\n",
        )
        .unwrap();
        assert_eq!(s.api_key(), "abc");
        assert_eq!(s.base_url(), tngfetch_api::DEFAULT_BASE_URL);
        assert!(s.system.display.progress_bars);
    }

    #[test]
    fn empty_document_is_default() {
        let s = Settings::parse("  \n").unwrap();
        assert_eq!(s.api_key(), "");
    }

    #[test]
    fn levels_and_streams_are_case_insensitive() {
        let s = Settings::parse(
            "system:\n  logging:\n    main:\n      level: warn\n      stream: stdout\n",
        )
        .unwrap();
        let opts = s.log_options();
        assert_eq!(opts.level, log::LevelFilter::Warn);
        assert_eq!(opts.stream, LogStream::Stdout);

        let s = Settings::parse("system:\n  logging:\n    main:\n      level: Warning\n").unwrap();
        assert_eq!(s.system.logging.main.level, LogLevel::Warning);
    }

    #[test]
    fn bad_level_is_parse_error() {
        let err = Settings::parse("system:\n  logging:\n    main:\n      level: LOUD\n").unwrap_err();
        assert!(err.contains("LOUD"), "{err}");
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "tng: [unclosed").unwrap();
        match Settings::from_file(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn explicit_missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.yaml");
        match locate(Some(&path)) {
            Err(ConfigError::NotFound { searched }) => assert_eq!(searched, vec![path]),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.yaml");
        std::fs::write(&path, "tng:\n  base_url: http://localhost:9000/api\n").unwrap();
        let (s, found) = Settings::load(Some(&path)).unwrap();
        assert_eq!(found, path);
        assert_eq!(s.base_url(), "http://localhost:9000/api");
    }

    #[test]
    fn api_key_expands_from_environment() {
        std::env::set_var("TNGFETCH_TEST_KEY_1", "from-env");
        let s = Settings::parse("tng:\n  api_key: ${TNGFETCH_TEST_KEY_1}\n").unwrap();
        assert_eq!(s.api_key(), "from-env");
        std::env::remove_var("TNGFETCH_TEST_KEY_1");

        let s = Settings::parse("tng:\n  api_key: ${TNGFETCH_UNSET_VAR_93}\n").unwrap();
        assert_eq!(s.api_key(), "");
    }

    #[test]
    fn developer_log_needs_directory() {
        let s = Settings::parse("system:\n  logging:\n    developer:\n      enabled: true\n").unwrap();
        assert!(s.developer_misconfigured());
        assert!(s.log_options().developer_dir.is_none());

        let s = Settings::parse(
            "system:\n  logging:\n    developer:\n      enabled: true\n      output_directory: /tmp/tng-logs\n",
        )
        .unwrap();
        assert!(!s.developer_misconfigured());
        assert_eq!(
            s.log_options().developer_dir,
            Some(PathBuf::from("/tmp/tng-logs"))
        );
    }

    #[test]
    fn set_api_key_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.yaml");
        std::fs::write(
            &path,
            "system:\n  display:\n    spinners: false\ntng:\n  base_url: http://x/api\n  api_key: old\n",
        )
        .unwrap();

        set_api_key(&path, "new-key").unwrap();
        let s = Settings::from_file(&path).unwrap();
        assert_eq!(s.api_key(), "new-key");
        assert_eq!(s.base_url(), "http://x/api");
        assert!(!s.system.display.spinners);
    }

    #[test]
    fn set_api_key_creates_tng_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.yaml");
        std::fs::write(&path, "system:\n  display:\n    progress_bars: false\n").unwrap();

        set_api_key(&path, "k1").unwrap();
        let s = Settings::from_file(&path).unwrap();
        assert_eq!(s.api_key(), "k1");
        assert!(!s.system.display.progress_bars);
    }

    #[test]
    fn set_api_key_on_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = set_api_key(&dir.path().join("missing.yaml"), "k").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn write_default_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        write_default(&path, false).unwrap();
        assert!(Settings::from_file(&path).is_ok());

        assert!(write_default(&path, false).is_err());
        std::fs::write(&path, "tng:\n  api_key: changed\n").unwrap();
        write_default(&path, true).unwrap();
        assert_eq!(Settings::from_file(&path).unwrap().api_key(), "");
    }

    #[test]
    fn masks_keys() {
        assert_eq!(mask_key(""), "not set");
        assert_eq!(mask_key("short"), "*****");
        assert_eq!(mask_key("0123456789abcdef"), "0123…cdef");
    }
}
