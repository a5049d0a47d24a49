use std::path::PathBuf;
use std::time::Duration;

use reframe_core::generation::{
    PollPolicy, DEFAULT_ANALYSIS_MODEL, DEFAULT_POLL_INTERVAL, DEFAULT_VIDEO_MODEL,
};
use reframe_genai::api::DEFAULT_BASE_URL;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// Key sent with every model call and appended to asset downloads.
    pub api_key: String,
    pub base_url: String,
    pub video_model: String,
    pub analysis_model: String,
    pub poll_policy: PollPolicy,
    /// Scratch directory for generated assets (deleted on release).
    pub asset_dir: PathBuf,
    /// Video to analyse. Required by the binary, optional for the library.
    pub source_video: Option<PathBuf>,
    /// Prompt that replaces the analysis suggestion.
    pub prompt: Option<String>,
    /// Where the downloaded video is written.
    pub output_dir: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

impl StudioConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                   | Default                                   |
    /// |---------------------------|-------------------------------------------|
    /// | `GEMINI_API_KEY`          | required                                  |
    /// | `GENAI_BASE_URL`          | `https://generativelanguage.googleapis.com/v1beta` |
    /// | `VIDEO_MODEL`             | `veo-2.0-generate-001`                    |
    /// | `ANALYSIS_MODEL`          | `gemini-2.5-flash`                        |
    /// | `POLL_INTERVAL_SECS`      | `10`                                      |
    /// | `POLL_MAX_ATTEMPTS`       | unset (poll until done)                   |
    /// | `POLL_BACKOFF_MULTIPLIER` | `1.0` (fixed interval)                    |
    /// | `POLL_MAX_INTERVAL_SECS`  | same as `POLL_INTERVAL_SECS`              |
    /// | `ASSET_DIR`               | `$TMPDIR/reframe-assets`                  |
    /// | `REFRAME_SOURCE_VIDEO`    | unset                                     |
    /// | `REFRAME_PROMPT`          | unset (use the analysis suggestion)       |
    /// | `REFRAME_OUTPUT_DIR`      | `.`                                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("GEMINI_API_KEY").ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        let interval_secs: u64 =
            parse_or(&get, "POLL_INTERVAL_SECS", "a whole number of seconds")?
                .unwrap_or(DEFAULT_POLL_INTERVAL.as_secs());
        if interval_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "POLL_INTERVAL_SECS",
                expected: "at least 1",
                value: "0".into(),
            });
        }
        let interval = Duration::from_secs(interval_secs);

        let mut poll_policy = PollPolicy::fixed(interval);

        match parse_or::<u32, _>(&get, "POLL_MAX_ATTEMPTS", "a positive integer")? {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    var: "POLL_MAX_ATTEMPTS",
                    expected: "a positive integer",
                    value: "0".into(),
                });
            }
            Some(max) => poll_policy = poll_policy.with_max_attempts(max),
            None => {}
        }

        let multiplier: f64 = parse_or(&get, "POLL_BACKOFF_MULTIPLIER", "a number >= 1.0")?
            .unwrap_or(1.0);
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                var: "POLL_BACKOFF_MULTIPLIER",
                expected: "a number >= 1.0",
                value: multiplier.to_string(),
            });
        }
        let max_interval =
            parse_or::<u64, _>(&get, "POLL_MAX_INTERVAL_SECS", "a whole number of seconds")?
                .map(Duration::from_secs)
                .unwrap_or(interval);
        poll_policy = poll_policy.with_backoff(multiplier, max_interval);

        Ok(Self {
            api_key,
            base_url: get("GENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            video_model: get("VIDEO_MODEL").unwrap_or_else(|| DEFAULT_VIDEO_MODEL.into()),
            analysis_model: get("ANALYSIS_MODEL").unwrap_or_else(|| DEFAULT_ANALYSIS_MODEL.into()),
            poll_policy,
            asset_dir: get("ASSET_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("reframe-assets")),
            source_video: get("REFRAME_SOURCE_VIDEO").map(PathBuf::from),
            prompt: get("REFRAME_PROMPT"),
            output_dir: get("REFRAME_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

fn parse_or<T, G>(
    get: &G,
    var: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, expected, value }),
    }
}
