//! Generation job state machine, polling policy, and model constants.
//!
//! A [`GenerationJob`] moves through
//! `Submitted -> Polling -> FetchingAsset -> Succeeded`, or drops into
//! `Failed` from any non-terminal state.  The asset reference and the
//! failure detail live inside the [`JobState`] variants that own them,
//! so a succeeded job can never carry an error and vice versa.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::error::CoreError;
use crate::prompt::normalize_prompt;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Fixed delay between status checks when no policy overrides it.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Model used for text-to-video generation.
pub const DEFAULT_VIDEO_MODEL: &str = "veo-2.0-generate-001";

/// Model used for frame analysis and prompt consistency checks.
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-2.5-flash";

/// Number of videos requested per generation job.
pub const OUTPUT_COUNT: u32 = 1;

// ---------------------------------------------------------------------------
// Job status / state
// ---------------------------------------------------------------------------

/// Flat status name of a job, without any variant payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Polling,
    FetchingAsset,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Polling => "polling",
            Self::FetchingAsset => "fetching_asset",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of a job together with the data that state owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// The submission call has been issued.
    Submitted,
    /// The remote job is running; `attempts` status checks so far.
    Polling { attempts: u32 },
    /// The remote job finished and its asset is being downloaded.
    FetchingAsset { asset_uri: String },
    /// The asset was downloaded.
    Succeeded { asset_uri: String },
    /// The job ended without an asset.
    Failed { detail: String },
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Submitted => JobStatus::Submitted,
            Self::Polling { .. } => JobStatus::Polling,
            Self::FetchingAsset { .. } => JobStatus::FetchingAsset,
            Self::Succeeded { .. } => JobStatus::Succeeded,
            Self::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// One remote video-generation attempt.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    id: JobId,
    prompt: String,
    state: JobState,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl GenerationJob {
    /// Create a job in the `Submitted` state.
    ///
    /// The prompt is trimmed; an empty prompt is rejected.
    pub fn new(prompt: &str) -> Result<Self, CoreError> {
        let prompt = normalize_prompt(prompt)?;
        let now = Utc::now();
        Ok(Self {
            id: uuid::Uuid::new_v4(),
            prompt,
            state: JobState::Submitted,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Reference to the produced asset; `Some` only when succeeded.
    pub fn result_asset_uri(&self) -> Option<&str> {
        match &self.state {
            JobState::Succeeded { asset_uri } => Some(asset_uri),
            _ => None,
        }
    }

    /// Failure reason; `Some` only when failed.
    pub fn error_detail(&self) -> Option<&str> {
        match &self.state {
            JobState::Failed { detail } => Some(detail),
            _ => None,
        }
    }

    /// Number of status checks issued so far.
    pub fn poll_attempts(&self) -> u32 {
        match self.state {
            JobState::Polling { attempts } => attempts,
            _ => 0,
        }
    }

    /// `Submitted -> Polling { attempts: 0 }`.
    pub fn begin_polling(&mut self) -> Result<(), CoreError> {
        match self.state {
            JobState::Submitted => {
                self.transition(JobState::Polling { attempts: 0 });
                Ok(())
            }
            _ => Err(self.invalid(JobStatus::Polling)),
        }
    }

    /// Count one more status check while polling.
    pub fn record_poll(&mut self) -> Result<u32, CoreError> {
        match self.state {
            JobState::Polling { attempts } => {
                let attempts = attempts + 1;
                self.transition(JobState::Polling { attempts });
                Ok(attempts)
            }
            _ => Err(self.invalid(JobStatus::Polling)),
        }
    }

    /// `Submitted | Polling -> FetchingAsset`.
    pub fn begin_fetch(&mut self, asset_uri: impl Into<String>) -> Result<(), CoreError> {
        match self.state {
            JobState::Submitted | JobState::Polling { .. } => {
                self.transition(JobState::FetchingAsset {
                    asset_uri: asset_uri.into(),
                });
                Ok(())
            }
            _ => Err(self.invalid(JobStatus::FetchingAsset)),
        }
    }

    /// `FetchingAsset -> Succeeded`, keeping the fetched asset reference.
    pub fn succeed(&mut self) -> Result<(), CoreError> {
        match &self.state {
            JobState::FetchingAsset { asset_uri } => {
                let asset_uri = asset_uri.clone();
                self.transition(JobState::Succeeded { asset_uri });
                Ok(())
            }
            _ => Err(self.invalid(JobStatus::Succeeded)),
        }
    }

    /// Any non-terminal state -> `Failed`.
    pub fn fail(&mut self, detail: impl Into<String>) -> Result<(), CoreError> {
        if self.status().is_terminal() {
            return Err(self.invalid(JobStatus::Failed));
        }
        self.transition(JobState::Failed {
            detail: detail.into(),
        });
        Ok(())
    }

    // ---- private helpers ----

    fn transition(&mut self, next: JobState) {
        self.state = next;
        self.updated_at = Utc::now();
    }

    fn invalid(&self, to: JobStatus) -> CoreError {
        CoreError::InvalidTransition {
            from: self.status().as_str(),
            to: to.as_str(),
        }
    }
}

// ---------------------------------------------------------------------------
// Poll policy
// ---------------------------------------------------------------------------

/// How often, and how many times, a running job is checked.
///
/// The default polls every [`DEFAULT_POLL_INTERVAL`] forever.  A ceiling
/// and a growing interval can be configured per deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay before the first status check.
    pub interval: Duration,
    /// Give up after this many status checks. `None` polls until done.
    pub max_attempts: Option<u32>,
    /// Factor by which the delay grows after each check (`1.0` = fixed).
    pub backoff_multiplier: f64,
    /// Upper bound on the delay between checks.
    pub max_interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            backoff_multiplier: 1.0,
            max_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollPolicy {
    /// Fixed-interval polling with no ceiling.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.backoff_multiplier = multiplier;
        self.max_interval = max_interval;
        self
    }

    /// Calculate the delay that follows `current`.
    ///
    /// The result never drops below `current` and is clamped to
    /// [`max_interval`](Self::max_interval) (unless `current` already
    /// exceeds it, in which case `current` is kept).
    pub fn next_interval(&self, current: Duration) -> Duration {
        if self.backoff_multiplier <= 1.0 {
            return current;
        }
        let next_ms = (current.as_millis() as f64 * self.backoff_multiplier) as u64;
        Duration::from_millis(next_ms)
            .min(self.max_interval)
            .max(current)
    }

    /// Whether status check number `attempt` (1-based) may be issued.
    pub fn allows_attempt(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    // -- job lifecycle --

    #[test]
    fn new_job_starts_submitted_with_trimmed_prompt() {
        let job = GenerationJob::new("  a cat in space ").unwrap();
        assert_eq!(job.status(), JobStatus::Submitted);
        assert_eq!(job.prompt(), "a cat in space");
        assert!(job.result_asset_uri().is_none());
        assert!(job.error_detail().is_none());
    }

    #[test]
    fn new_job_rejects_blank_prompt() {
        assert_matches!(GenerationJob::new("  "), Err(CoreError::Validation(_)));
    }

    #[test]
    fn happy_path_sets_asset_only_on_success() {
        let mut job = GenerationJob::new("prompt").unwrap();
        job.begin_polling().unwrap();
        assert_eq!(job.record_poll().unwrap(), 1);
        assert_eq!(job.record_poll().unwrap(), 2);
        assert_eq!(job.poll_attempts(), 2);

        job.begin_fetch("https://x/vid").unwrap();
        assert_eq!(job.status(), JobStatus::FetchingAsset);
        assert!(job.result_asset_uri().is_none());

        job.succeed().unwrap();
        assert_eq!(job.status(), JobStatus::Succeeded);
        assert_eq!(job.result_asset_uri(), Some("https://x/vid"));
        assert!(job.error_detail().is_none());
    }

    #[test]
    fn failure_sets_detail_only() {
        let mut job = GenerationJob::new("prompt").unwrap();
        job.begin_polling().unwrap();
        job.fail("quota exceeded").unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.error_detail(), Some("quota exceeded"));
        assert!(job.result_asset_uri().is_none());
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let mut job = GenerationJob::new("prompt").unwrap();
        job.fail("boom").unwrap();
        assert_matches!(
            job.fail("again"),
            Err(CoreError::InvalidTransition { from: "failed", to: "failed" })
        );
        assert_matches!(job.begin_polling(), Err(CoreError::InvalidTransition { .. }));
        assert_matches!(job.begin_fetch("u"), Err(CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn succeed_requires_fetching_state() {
        let mut job = GenerationJob::new("prompt").unwrap();
        assert_matches!(
            job.succeed(),
            Err(CoreError::InvalidTransition { from: "submitted", to: "succeeded" })
        );
    }

    #[test]
    fn record_poll_requires_polling_state() {
        let mut job = GenerationJob::new("prompt").unwrap();
        assert!(job.record_poll().is_err());
    }

    #[test]
    fn submitted_job_can_fetch_directly() {
        // A submission that comes back already done skips polling.
        let mut job = GenerationJob::new("prompt").unwrap();
        job.begin_fetch("https://x/vid").unwrap();
        assert_eq!(job.status(), JobStatus::FetchingAsset);
    }

    #[test]
    fn status_names_are_stable() {
        assert_eq!(JobStatus::FetchingAsset.to_string(), "fetching_asset");
        assert_eq!(
            serde_json::to_string(&JobStatus::Succeeded).unwrap(),
            "\"succeeded\""
        );
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Polling.is_terminal());
    }

    // -- poll policy --

    #[test]
    fn default_policy_is_fixed_ten_seconds_unbounded() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(10));
        assert_eq!(policy.next_interval(policy.interval), Duration::from_secs(10));
        assert!(policy.allows_attempt(u32::MAX));
    }

    #[test]
    fn max_attempts_is_inclusive() {
        let policy = PollPolicy::default().with_max_attempts(3);
        assert!(policy.allows_attempt(3));
        assert!(!policy.allows_attempt(4));
    }

    #[test]
    fn backoff_doubles_and_clamps() {
        let policy = PollPolicy::fixed(Duration::from_secs(5))
            .with_backoff(2.0, Duration::from_secs(30));
        let mut delay = policy.interval;
        let expected = [5, 10, 20, 30, 30];
        for &secs in &expected {
            assert_eq!(delay.as_secs(), secs);
            delay = policy.next_interval(delay);
        }
    }

    #[test]
    fn backoff_never_shrinks_below_current() {
        let policy = PollPolicy::fixed(Duration::from_secs(60))
            .with_backoff(2.0, Duration::from_secs(30));
        assert_eq!(
            policy.next_interval(Duration::from_secs(60)),
            Duration::from_secs(60)
        );
    }
}
