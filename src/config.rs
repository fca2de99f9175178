//! Runtime configuration.
//!
//! Everything comes from the environment (optionally via `.env`); the
//! command line is not consulted. [`Args`] is the raw clap view and
//! [`Settings`] the validated, immutable form handed to the monitor.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tracing::warn;

use crate::models::{parse_wishlists, WishlistConfig};
use crate::scrapers::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SITE_ORIGIN '{origin}' is not a valid URL: {source}")]
    InvalidOrigin {
        origin: String,
        #[source]
        source: url::ParseError,
    },

    #[error("NOTIFY_THRESHOLD must be a non-negative number, got {0}")]
    InvalidThreshold(f64),

    #[error("invalid environment value: {0}")]
    Invalid(#[from] clap::Error),
}

/// Raw configuration as read from the environment.
///
/// The long names exist only so tests can build an [`Args`] without
/// touching process state; [`Settings::load`] never parses the real argv.
#[derive(Debug, Clone, Parser)]
#[command(name = "wishwatch")]
pub struct Args {
    /// Comma-separated `name|url` entries (a bare url names itself)
    #[arg(long, env = "WISHLISTS", default_value = "")]
    pub wishlists: String,

    /// Seconds between full passes
    #[arg(long, env = "CHECK_INTERVAL", default_value_t = 21600)]
    pub check_interval: u64,

    /// Seconds between pages of one wishlist
    #[arg(long, env = "PAGE_SLEEP", default_value_t = 5)]
    pub page_sleep: u64,

    /// Seconds between wishlists
    #[arg(long, env = "WISHLIST_SLEEP", default_value_t = 60)]
    pub wishlist_sleep: u64,

    /// Seconds to back off after a page fails every attempt
    #[arg(long, env = "FAIL_SLEEP", default_value_t = 6000)]
    pub fail_sleep: u64,

    /// Attempts per page
    #[arg(long, env = "RETRY_COUNT", default_value_t = 3)]
    pub retry_count: u32,

    /// Seconds between attempts
    #[arg(long, env = "RETRY_SLEEP", default_value_t = 600)]
    pub retry_sleep: u64,

    /// Seconds to back off after a CAPTCHA or unexpected page
    #[arg(long, env = "CAPTCHA_SLEEP", default_value_t = 1200)]
    pub captcha_sleep: u64,

    /// Minimum price move, in percent, worth reporting
    #[arg(long, env = "NOTIFY_THRESHOLD", default_value_t = 0.0)]
    pub notify_threshold: f64,

    #[arg(long, env = "SMTP_SERVER", default_value = "smtp.gmail.com")]
    pub smtp_server: String,

    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    /// Sender address and SMTP login
    #[arg(long, env = "EMAIL_ADDRESS")]
    pub email_address: Option<String>,

    #[arg(long, env = "EMAIL_PASSWORD", hide_env_values = true)]
    pub email_password: Option<String>,

    #[arg(long, env = "TO_ADDRESS")]
    pub to_address: Option<String>,

    /// Fixed User-Agent (rotates through mobile agents when unset)
    #[arg(long, env = "USER_AGENT")]
    pub user_agent: Option<String>,

    #[arg(long, env = "CACHE_FILE", default_value = "/data/wishlist_cache.json")]
    pub cache_file: PathBuf,

    #[arg(long, env = "LOG_FILE", default_value = "/data/monitor.log")]
    pub log_file: PathBuf,

    #[arg(long, env = "SITE_ORIGIN", default_value = "https://www.amazon.com")]
    pub site_origin: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT", default_value_t = 15)]
    pub request_timeout: u64,

    /// Directory for raw bodies of pages that could not be understood
    #[arg(long, env = "DUMP_DIR")]
    pub dump_dir: Option<PathBuf>,
}

/// Credentials for the SMTP sink.
#[derive(Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub from_address: String,
    pub password: String,
    pub to_address: String,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("from_address", &self.from_address)
            .field("password", &"<redacted>")
            .field("to_address", &self.to_address)
            .finish()
    }
}

/// Delays applied between requests and after failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delays {
    pub check_interval: Duration,
    pub page: Duration,
    pub wishlist: Duration,
    pub failure: Duration,
    pub retry: Duration,
    pub blocked: Duration,
}

impl Delays {
    /// All-zero delays.
    pub const ZERO: Delays = Delays {
        check_interval: Duration::ZERO,
        page: Duration::ZERO,
        wishlist: Duration::ZERO,
        failure: Duration::ZERO,
        retry: Duration::ZERO,
        blocked: Duration::ZERO,
    };
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub wishlists: Vec<WishlistConfig>,
    pub delays: Delays,
    pub retry_count: u32,
    pub notify_threshold: f64,
    pub smtp: Option<SmtpSettings>,
    pub user_agent: Option<String>,
    pub cache_file: PathBuf,
    pub log_file: PathBuf,
    pub site_origin: String,
    pub request_timeout: Duration,
    pub dump_dir: Option<PathBuf>,
}

impl Settings {
    /// Read and validate the environment. Command-line arguments are ignored.
    pub fn load() -> Result<Self, ConfigError> {
        let args = Args::try_parse_from(["wishwatch"])?;
        Self::from_args(args)
    }

    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        url::Url::parse(&args.site_origin).map_err(|source| ConfigError::InvalidOrigin {
            origin: args.site_origin.clone(),
            source,
        })?;

        if !args.notify_threshold.is_finite() || args.notify_threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold(args.notify_threshold));
        }

        let smtp = match (
            present(args.email_address),
            present(args.email_password),
            present(args.to_address),
        ) {
            (Some(from_address), Some(password), Some(to_address)) => Some(SmtpSettings {
                server: args.smtp_server,
                port: args.smtp_port,
                from_address,
                password,
                to_address,
            }),
            _ => None,
        };

        Ok(Self {
            wishlists: parse_wishlists(&args.wishlists),
            delays: Delays {
                check_interval: Duration::from_secs(args.check_interval),
                page: Duration::from_secs(args.page_sleep),
                wishlist: Duration::from_secs(args.wishlist_sleep),
                failure: Duration::from_secs(args.fail_sleep),
                retry: Duration::from_secs(args.retry_sleep),
                blocked: Duration::from_secs(args.captcha_sleep),
            },
            retry_count: args.retry_count.max(1),
            notify_threshold: args.notify_threshold,
            smtp,
            user_agent: present(args.user_agent),
            cache_file: args.cache_file,
            log_file: args.log_file,
            site_origin: args.site_origin,
            request_timeout: Duration::from_secs(args.request_timeout),
            dump_dir: args.dump_dir,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_count, self.delays.retry)
    }

    /// Log anything that limits what the monitor can do.
    pub fn warn_incomplete(&self) {
        if self.wishlists.is_empty() {
            warn!("WISHLISTS is empty; nothing will be monitored");
        }
        if self.smtp.is_none() {
            warn!("EMAIL_ADDRESS, EMAIL_PASSWORD and TO_ADDRESS not all set; notifications will only be logged");
        }
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["wishwatch"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flag_values() {
        let settings = Settings::from_args(args(&[
            "--wishlists",
            "Books|https://a/list/1, https://b/list/2",
            "--page-sleep",
            "2",
            "--notify-threshold",
            "12.5",
        ]))
        .unwrap();

        assert_eq!(settings.wishlists.len(), 2);
        assert_eq!(settings.wishlists[0].name, "Books");
        assert_eq!(settings.wishlists[1].name, "https://b/list/2");
        assert_eq!(settings.delays.page, Duration::from_secs(2));
        assert_eq!(settings.notify_threshold, 12.5);
    }

    #[test]
    fn test_retry_count_clamped() {
        let settings = Settings::from_args(args(&["--retry-count", "0"])).unwrap();
        assert_eq!(settings.retry_count, 1);
        assert_eq!(settings.retry_policy().max_attempts, 1);
    }

    #[test]
    fn test_smtp_requires_all_three() {
        let partial = Settings::from_args(args(&[
            "--email-address",
            "me@example.com",
            "--email-password",
            "pw",
            "--to-address",
            "  ",
        ]))
        .unwrap();
        assert!(partial.smtp.is_none());

        let full = Settings::from_args(args(&[
            "--email-address",
            "me@example.com",
            "--email-password",
            "pw",
            "--to-address",
            "you@example.com",
            "--smtp-port",
            "2525",
        ]))
        .unwrap();
        let smtp = full.smtp.unwrap();
        assert_eq!(smtp.port, 2525);
        assert_eq!(smtp.to_address, "you@example.com");
        assert!(!format!("{:?}", smtp).contains("pw\""));
    }

    #[test]
    fn test_rejects_bad_origin_and_threshold() {
        assert!(matches!(
            Settings::from_args(args(&["--site-origin", "not a url"])),
            Err(ConfigError::InvalidOrigin { .. })
        ));
        assert!(matches!(
            Settings::from_args(args(&["--notify-threshold=-1"])),
            Err(ConfigError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_load_ignores_process_arguments() {
        // The test harness runs with its own argv; none of it may be parsed.
        let settings = Settings::load().unwrap();
        assert!(settings.retry_count >= 1);
    }
}
