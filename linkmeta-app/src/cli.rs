use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::Parser;
use linkmeta_common::{LogConfig, LogFormat};
use linkmeta_config::{ExtractProfile, LinkmetaConfig, LoggingSettings};
use linkmeta_http::FetcherConfig;
use linkmeta_web::Profile;

/// Fetch web pages and print their link-preview metadata as JSON.
#[derive(Debug, Parser)]
#[command(name = "linkmeta", version)]
pub struct Cli {
    /// YAML config file (defaults to <config_dir>/linkmeta/linkmeta.yaml when present).
    #[arg(long, value_name = "PATH", env = "LINKMETA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Whole-request timeout in seconds.
    #[arg(long, value_name = "N")]
    pub timeout_secs: Option<u64>,

    /// User-Agent header; pass an empty string to send none.
    #[arg(long, value_name = "UA")]
    pub user_agent: Option<String>,

    /// Redirects to follow before giving up; 0 reports the 3xx itself.
    #[arg(long, value_name = "N")]
    pub max_redirects: Option<usize>,

    /// Pages fetched at once.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Fall back to Open Graph, Twitter card and markup sources.
    #[arg(long)]
    pub extended: bool,

    /// Pretty-print each JSON result.
    #[arg(long)]
    pub pretty: bool,

    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,
}

/// Config file values with command-line flags laid over them.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub fetcher: FetcherConfig,
    pub profile: Profile,
    pub concurrency: usize,
    pub pretty: bool,
}

impl RunSettings {
    pub fn resolve(cli: &Cli, cfg: &LinkmetaConfig) -> Self {
        let fetch = &cfg.fetch;
        let mut fetcher = FetcherConfig::default()
            .with_timeout(Duration::from_secs(cli.timeout_secs.unwrap_or(fetch.timeout_secs)))
            .with_connect_timeout(Duration::from_secs(fetch.connect_timeout_secs))
            .with_max_redirects(cli.max_redirects.unwrap_or(fetch.max_redirects));
        if let Some(ua) = cli.user_agent.as_ref().or(fetch.user_agent.as_ref()) {
            fetcher = fetcher.with_user_agent(Some(ua.clone()));
        }

        let profile = if cli.extended {
            Profile::Extended
        } else {
            match cfg.extract.profile {
                ExtractProfile::Standard => Profile::Standard,
                ExtractProfile::Extended => Profile::Extended,
            }
        };

        Self {
            fetcher,
            profile,
            concurrency: cli.concurrency.unwrap_or(cfg.batch.concurrency).max(1),
            pretty: cli.pretty,
        }
    }
}

pub fn log_config(logging: &LoggingSettings) -> Result<LogConfig> {
    let format: LogFormat = logging.format.parse().map_err(|e: String| anyhow!(e))?;
    Ok(LogConfig {
        log_dir: logging.dir.clone(),
        emit_stderr: logging.emit_stderr,
        format,
        default_filter: logging.filter.clone(),
        ..LogConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkmeta_config::LinkmetaConfigLoader;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("linkmeta").chain(args.iter().copied())).unwrap()
    }

    fn config(yaml: &str) -> LinkmetaConfig {
        LinkmetaConfigLoader::new().with_yaml_str(yaml).load().unwrap()
    }

    #[test]
    fn urls_are_required() {
        assert!(Cli::try_parse_from(["linkmeta"]).is_err());
    }

    #[test]
    fn defaults_come_from_config() {
        let settings = RunSettings::resolve(&cli(&["https://a.test"]), &LinkmetaConfig::default());
        assert_eq!(settings.fetcher.timeout, Duration::from_secs(15));
        assert_eq!(settings.fetcher.max_redirects, 10);
        assert!(settings.fetcher.user_agent.is_some());
        assert_eq!(settings.profile, Profile::Standard);
        assert_eq!(settings.concurrency, 8);
        assert!(!settings.pretty);
    }

    #[test]
    fn flags_override_config() {
        let cfg = config(
            "fetch:\n  timeout_secs: 30\n  user_agent: from-file\nbatch:\n  concurrency: 4\n",
        );
        let settings = RunSettings::resolve(
            &cli(&[
                "--timeout-secs",
                "2",
                "--user-agent",
                "from-flag",
                "--concurrency",
                "0",
                "--extended",
                "--pretty",
                "https://a.test",
                "https://b.test",
            ]),
            &cfg,
        );
        assert_eq!(settings.fetcher.timeout, Duration::from_secs(2));
        assert_eq!(settings.fetcher.user_agent.as_deref(), Some("from-flag"));
        assert_eq!(settings.profile, Profile::Extended);
        assert_eq!(settings.concurrency, 1);
        assert!(settings.pretty);
    }

    #[test]
    fn config_profile_and_agent_apply_without_flags() {
        let cfg = config("fetch:\n  user_agent: \"\"\nextract:\n  profile: extended\n");
        let settings = RunSettings::resolve(&cli(&["https://a.test"]), &cfg);
        assert_eq!(settings.fetcher.user_agent.as_deref(), Some(""));
        assert_eq!(settings.profile, Profile::Extended);
    }

    #[test]
    fn log_format_is_validated() {
        let mut logging = LoggingSettings::default();
        assert_eq!(log_config(&logging).unwrap().format, LogFormat::Text);
        logging.format = "json".into();
        assert_eq!(log_config(&logging).unwrap().format, LogFormat::Json);
        logging.format = "xml".into();
        assert!(log_config(&logging).is_err());
    }
}
