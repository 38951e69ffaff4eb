//! Loader for linkmeta configuration with YAML + environment overlays.
//!
//! Sources are merged in order: YAML files and inline snippets first, then
//! `LINKMETA__`-prefixed environment variables (`__` separates nesting, so
//! `LINKMETA__FETCH__TIMEOUT_SECS=30` sets `fetch.timeout_secs`). `${VAR}`
//! placeholders in string values are expanded after merging. Every key is
//! optional; an empty configuration yields [`LinkmetaConfig::default`].
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAX_EXPANSION_ROUNDS: usize = 8;
const ENV_PREFIX: &str = "LINKMETA";
const DEFAULT_FILE_NAME: &str = "linkmeta.yaml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkmetaConfig {
    pub fetch: FetchSettings,
    pub extract: ExtractSettings,
    pub batch: BatchSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Absent → built-in agent; empty string → no `User-Agent` header.
    pub user_agent: Option<String>,
    pub max_redirects: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            connect_timeout_secs: 5,
            user_agent: None,
            max_redirects: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractProfile {
    #[default]
    Standard,
    Extended,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractSettings {
    pub profile: ExtractProfile,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchSettings {
    pub concurrency: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Used when `RUST_LOG` is unset.
    pub filter: String,
    /// `text` or `json`.
    pub format: String,
    pub emit_stderr: bool,
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            format: "text".into(),
            emit_stderr: false,
            dir: None,
        }
    }
}

/// `<config_dir>/linkmeta/linkmeta.yaml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("linkmeta").join(DEFAULT_FILE_NAME))
}

/// Expand `$VAR`/`${VAR}` in every string leaf. Unset variables stay literal.
fn expand_placeholders(value: &mut Value) {
    match value {
        Value::String(s) if s.contains('$') => *s = expand_str(s),
        Value::Array(items) => items.iter_mut().for_each(expand_placeholders),
        Value::Object(map) => map.values_mut().for_each(expand_placeholders),
        _ => {}
    }
}

// Variables may point at other variables; stop after a fixed number of rounds
// so `A=${B}`, `B=${A}` terminates.
fn expand_str(raw: &str) -> String {
    let mut current = raw.to_owned();
    for _ in 0..MAX_EXPANSION_ROUNDS {
        let next =
            shellexpand::env_with_context_no_errors(&current, |name| std::env::var(name).ok())
                .into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

enum Layer {
    File { path: PathBuf, required: bool },
    Yaml(String),
}

/// Collects config layers; later layers override earlier ones.
#[derive(Default)]
pub struct LinkmetaConfigLoader {
    layers: Vec<Layer>,
}

impl LinkmetaConfigLoader {
    /// Start empty. `LINKMETA__` environment overrides are always applied last.
    ///
    /// ```
    /// use linkmeta_config::{ExtractProfile, LinkmetaConfigLoader};
    ///
    /// let config = LinkmetaConfigLoader::new()
    ///     .with_yaml_str("fetch:\n  timeout_secs: 3\nextract:\n  profile: extended")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.fetch.timeout_secs, 3);
    /// assert_eq!(config.fetch.max_redirects, 10);
    /// assert_eq!(config.extract.profile, ExtractProfile::Extended);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// A file that must exist. Format follows the extension (`.yaml`, `.toml`, `.json`).
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.push_file(path.as_ref(), true)
    }

    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.push_file(path.as_ref(), false)
    }

    /// The per-user file from [`default_config_path`], skipped when absent.
    pub fn with_default_file(self) -> Self {
        match default_config_path() {
            Some(path) => self.push_file(&path, false),
            None => self,
        }
    }

    /// Inline YAML, mostly for tests.
    ///
    /// ```
    /// use linkmeta_config::LinkmetaConfigLoader;
    ///
    /// let cfg = LinkmetaConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// fetch:
    ///   user_agent: "preview-bot/2.0"
    /// batch:
    ///   concurrency: 2
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.fetch.user_agent.as_deref(), Some("preview-bot/2.0"));
    /// assert_eq!(cfg.batch.concurrency, 2);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.layers.push(Layer::Yaml(yaml.to_owned()));
        self
    }

    fn push_file(mut self, path: &Path, required: bool) -> Self {
        self.layers.push(Layer::File {
            path: path.to_path_buf(),
            required,
        });
        self
    }

    /// Merge every layer, expand placeholders, and deserialize.
    ///
    /// ```
    /// use linkmeta_config::LinkmetaConfigLoader;
    ///
    /// unsafe { std::env::set_var("PREVIEW_AGENT", "injected-from-env"); }
    ///
    /// let config = LinkmetaConfigLoader::new()
    ///     .with_yaml_str("fetch:\n  user_agent: \"${PREVIEW_AGENT}/1\"")
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.fetch.user_agent.as_deref(), Some("injected-from-env/1"));
    ///
    /// unsafe { std::env::remove_var("PREVIEW_AGENT"); }
    /// ```
    pub fn load(self) -> Result<LinkmetaConfig, ConfigError> {
        let builder = self
            .layers
            .into_iter()
            .fold(Config::builder(), |builder, layer| match layer {
                Layer::File { path, required } => {
                    builder.add_source(File::from(path.as_path()).required(required))
                }
                Layer::Yaml(yaml) => builder.add_source(File::from_str(&yaml, FileFormat::Yaml)),
            })
            // Env values stay strings here; numeric and bool fields are parsed
            // from them when the typed struct is deserialized below.
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let mut merged: Value = builder.build()?.try_deserialize()?;
        expand_placeholders(&mut merged);
        Config::try_from(&merged)?.try_deserialize()
    }
}
