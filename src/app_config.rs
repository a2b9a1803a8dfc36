//! Config file loading for CLI defaults.
//!
//! The file is a flat `key = value` list (a TOML subset): double-quoted
//! strings, integers, floats, booleans and `#` comments. Every key is
//! optional; values present override [`CrawlConfig`] defaults and are in
//! turn overridden by CLI flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use govcrawl::{CrawlConfig, RobotsFallback};

/// Longest accepted request timeout or pacing delay, in seconds.
pub const MAX_SECS: u64 = 3600;

/// Accepted bounds for `max_filename_len`.
pub const FILENAME_LEN_RANGE: std::ops::RangeInclusive<usize> = 20..=255;

/// File-backed overrides for [`CrawlConfig`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileConfig {
    pub user_agent: Option<String>,
    /// Request timeout in whole seconds.
    pub timeout_secs: Option<u64>,
    /// Minimum delay between requests in (fractional) seconds.
    pub delay_secs: Option<f64>,
    pub out_dir: Option<PathBuf>,
    pub sources_csv: Option<PathBuf>,
    pub discovered_csv: Option<PathBuf>,
    /// Log file path; an empty string disables file logging.
    pub log_file: Option<PathBuf>,
    pub robots_fallback: Option<RobotsFallback>,
    pub concurrency: Option<usize>,
    pub max_filename_len: Option<usize>,
    pub save_seed_pages: Option<bool>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(timeout) = self.timeout_secs
            && !(1..=MAX_SECS).contains(&timeout)
        {
            bail!("Invalid config value for `timeout_secs`: {timeout}. Expected range: 1..={MAX_SECS}");
        }

        if let Some(delay) = self.delay_secs {
            validate_delay_secs(delay)
                .with_context(|| format!("Invalid config value for `delay_secs`: {delay}"))?;
        }

        if let Some(concurrency) = self.concurrency
            && !(1..=govcrawl::download::MAX_CONCURRENCY).contains(&concurrency)
        {
            bail!(
                "Invalid config value for `concurrency`: {concurrency}. Expected range: 1..={}",
                govcrawl::download::MAX_CONCURRENCY
            );
        }

        if let Some(len) = self.max_filename_len
            && !FILENAME_LEN_RANGE.contains(&len)
        {
            bail!(
                "Invalid config value for `max_filename_len`: {len}. Expected range: {}..={}",
                FILENAME_LEN_RANGE.start(),
                FILENAME_LEN_RANGE.end()
            );
        }

        if let Some(user_agent) = &self.user_agent
            && user_agent.trim().is_empty()
        {
            bail!("Invalid config value for `user_agent`: must not be empty");
        }

        Ok(())
    }

    /// Writes every present value onto `config`.
    pub fn apply_to(&self, config: &mut CrawlConfig) -> Result<()> {
        if let Some(user_agent) = &self.user_agent {
            config.user_agent.clone_from(user_agent);
        }
        if let Some(timeout) = self.timeout_secs {
            config.timeout = Duration::from_secs(timeout);
        }
        if let Some(delay) = self.delay_secs {
            config.delay = delay_from_secs(delay)?;
        }
        if let Some(out_dir) = &self.out_dir {
            config.out_dir.clone_from(out_dir);
        }
        if let Some(sources_csv) = &self.sources_csv {
            config.sources_csv.clone_from(sources_csv);
        }
        if let Some(discovered_csv) = &self.discovered_csv {
            config.discovered_csv.clone_from(discovered_csv);
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = if log_file.as_os_str().is_empty() {
                None
            } else {
                Some(log_file.clone())
            };
        }
        if let Some(fallback) = self.robots_fallback {
            config.robots_fallback = fallback;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(len) = self.max_filename_len {
            config.max_filename_len = len;
        }
        if let Some(save) = self.save_seed_pages {
            config.save_seed_pages = save;
        }
        Ok(())
    }
}

/// Checks a pacing delay expressed in seconds.
pub fn validate_delay_secs(delay: f64) -> Result<()> {
    if !delay.is_finite() || delay < 0.0 {
        bail!("Expected a non-negative number of seconds");
    }
    #[allow(clippy::cast_precision_loss)]
    let max = MAX_SECS as f64;
    if delay > max {
        bail!("Expected range: 0..={MAX_SECS}");
    }
    Ok(())
}

/// Converts a validated delay in seconds to a [`Duration`].
pub fn delay_from_secs(delay: f64) -> Result<Duration> {
    validate_delay_secs(delay)?;
    Duration::try_from_secs_f64(delay).context("Delay out of range")
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/govcrawl/config.toml`
/// 2. `$HOME/.config/govcrawl/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("govcrawl")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("govcrawl")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file named on the command line, or the default one if
/// present. An explicit path that does not exist is an error.
pub fn load_file_config(explicit: Option<&Path>) -> Result<Option<(PathBuf, FileConfig)>> {
    if let Some(path) = explicit {
        let config = read_file_config(path)?;
        return Ok(Some((path.to_path_buf(), config)));
    }

    let Some(path) = resolve_default_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    let config = read_file_config(&path)?;
    Ok(Some((path, config)))
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_no = line_index + 1;
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "user_agent" => {
                cfg.user_agent = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "timeout_secs" => {
                cfg.timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "delay_secs" => {
                cfg.delay_secs = Some(parse_number(value).with_context(invalid)?);
            }
            "out_dir" => {
                cfg.out_dir = Some(parse_path(value).with_context(invalid)?);
            }
            "sources_csv" => {
                cfg.sources_csv = Some(parse_path(value).with_context(invalid)?);
            }
            "discovered_csv" => {
                cfg.discovered_csv = Some(parse_path(value).with_context(invalid)?);
            }
            "log_file" => {
                cfg.log_file = Some(parse_path(value).with_context(invalid)?);
            }
            "robots_fallback" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                let fallback = RobotsFallback::parse(&parsed).with_context(|| {
                    format!(
                        "Invalid `robots_fallback` value '{parsed}' on line {line_no}: expected one of: allow, deny"
                    )
                })?;
                cfg.robots_fallback = Some(fallback);
            }
            "concurrency" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                cfg.concurrency = Some(usize::try_from(parsed).context("concurrency out of range")?);
            }
            "max_filename_len" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                cfg.max_filename_len =
                    Some(usize::try_from(parsed).context("max_filename_len out of range")?);
            }
            "save_seed_pages" => {
                cfg.save_seed_pages = Some(parse_boolean(value).with_context(invalid)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    let Some(inner) = raw_value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        bail!("Expected double-quoted string");
    };
    Ok(inner.to_string())
}

fn parse_path(raw_value: &str) -> Result<PathBuf> {
    parse_string_literal(raw_value).map(PathBuf::from)
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_number(raw_value: &str) -> Result<f64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected numeric value");
    }
    Ok(token.parse::<f64>()?)
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
            # crawl settings
            delay_secs = 1.5
            concurrency = 4   # parallel downloads
            robots_fallback = "deny"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.delay_secs, Some(1.5));
        assert_eq!(cfg.concurrency, Some(4));
        assert_eq!(cfg.robots_fallback, Some(RobotsFallback::Deny));
        assert!(cfg.user_agent.is_none());
        assert!(cfg.out_dir.is_none());
    }

    #[test]
    fn test_parse_config_all_fields() {
        let cfg = parse_config_str(
            r#"
            user_agent = "lab-crawler/2.0 (+https://lab.example/crawler)"
            timeout_secs = 45
            delay_secs = 2
            out_dir = "/srv/crawl/raw"
            sources_csv = "seeds.csv"
            discovered_csv = "found.csv"
            log_file = "crawl.log"
            robots_fallback = "allow"
            concurrency = 2
            max_filename_len = 80
            save_seed_pages = false
            "#,
        )
        .unwrap();
        assert_eq!(
            cfg.user_agent.as_deref(),
            Some("lab-crawler/2.0 (+https://lab.example/crawler)")
        );
        assert_eq!(cfg.timeout_secs, Some(45));
        assert_eq!(cfg.delay_secs, Some(2.0));
        assert_eq!(cfg.out_dir, Some(PathBuf::from("/srv/crawl/raw")));
        assert_eq!(cfg.sources_csv, Some(PathBuf::from("seeds.csv")));
        assert_eq!(cfg.discovered_csv, Some(PathBuf::from("found.csv")));
        assert_eq!(cfg.log_file, Some(PathBuf::from("crawl.log")));
        assert_eq!(cfg.robots_fallback, Some(RobotsFallback::Allow));
        assert_eq!(cfg.concurrency, Some(2));
        assert_eq!(cfg.max_filename_len, Some(80));
        assert_eq!(cfg.save_seed_pages, Some(false));
    }

    #[test]
    fn test_parse_config_hash_inside_string_is_not_a_comment() {
        let cfg = parse_config_str(r#"user_agent = "bot#1/1.0" # trailing"#).unwrap();
        assert_eq!(cfg.user_agent.as_deref(), Some("bot#1/1.0"));
    }

    #[test]
    fn test_parse_config_unknown_key_fails() {
        let err = parse_config_str("rate_limit = 5").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_parse_config_missing_equals_fails() {
        let err = parse_config_str("concurrency 4").unwrap_err();
        assert!(err.to_string().contains("expected key = value"));
    }

    #[test]
    fn test_parse_config_unquoted_string_fails() {
        assert!(parse_config_str("out_dir = data").is_err());
    }

    #[test]
    fn test_parse_config_rejects_out_of_range_values() {
        assert!(parse_config_str("concurrency = 0").is_err());
        assert!(parse_config_str("concurrency = 33").is_err());
        assert!(parse_config_str("timeout_secs = 0").is_err());
        assert!(parse_config_str("timeout_secs = 3601").is_err());
        assert!(parse_config_str("delay_secs = -1").is_err());
        assert!(parse_config_str("delay_secs = 3600.5").is_err());
        assert!(parse_config_str("max_filename_len = 19").is_err());
        assert!(parse_config_str("max_filename_len = 256").is_err());
    }

    #[test]
    fn test_parse_config_rejects_unknown_fallback() {
        let err = parse_config_str(r#"robots_fallback = "maybe""#).unwrap_err();
        assert!(format!("{err:#}").contains("allow, deny"));
    }

    #[test]
    fn test_parse_config_zero_delay_is_valid() {
        let cfg = parse_config_str("delay_secs = 0").unwrap();
        assert_eq!(cfg.delay_secs, Some(0.0));
    }

    #[test]
    fn test_apply_to_overrides_only_present_values() {
        let file = FileConfig {
            delay_secs: Some(0.25),
            concurrency: Some(3),
            ..FileConfig::default()
        };
        let mut config = CrawlConfig::default();
        file.apply_to(&mut config).unwrap();
        assert_eq!(config.delay, Duration::from_millis(250));
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.out_dir, PathBuf::from("data/raw"));
    }

    #[test]
    fn test_apply_to_empty_log_file_disables_file_logging() {
        let file = FileConfig {
            log_file: Some(PathBuf::new()),
            ..FileConfig::default()
        };
        let mut config = CrawlConfig::default();
        file.apply_to(&mut config).unwrap();
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_load_file_config_explicit_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_file_config(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_file_config_explicit_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("govcrawl.toml");
        fs::write(&path, "timeout_secs = 12\n").unwrap();
        let (loaded_path, cfg) = load_file_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded_path, path);
        assert_eq!(cfg.timeout_secs, Some(12));
    }

    #[test]
    fn test_delay_from_secs_handles_fractions() {
        assert_eq!(delay_from_secs(0.5).unwrap(), Duration::from_millis(500));
        assert_eq!(delay_from_secs(0.0).unwrap(), Duration::ZERO);
        assert!(delay_from_secs(f64::NAN).is_err());
    }
}
