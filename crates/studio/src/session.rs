//! Interactive session state.
//!
//! A [`Studio`] is the read-only projection of one user's work: it never
//! touches a running job's state directly, only the progress messages and
//! the terminal result the orchestrator hands back.  Every operation
//! stores its failure as a display message in [`Studio::error`] and also
//! returns it, so a caller may either render or propagate.

use std::path::{Path, PathBuf};

use chrono::Utc;
use reframe_core::assets::{AssetKind, AssetSlot, AssetStore, LocalAsset};
use reframe_core::error::CoreError;
use reframe_core::ffmpeg::{ExtractedFrame, FfmpegError, Ffmpeg, FrameExtractor};
use reframe_core::generation::PollPolicy;
use reframe_core::prompt::normalize_prompt;
use reframe_core::types::{AnalysisResult, ConsistencyResult, JobId};
use reframe_genai::analysis::{self, AnalysisError};
use reframe_genai::backend::{ContentModel, VideoGenerationBackend};
use reframe_pipeline::{progress_channel, run_generation_job, GenerationError, GenerationEvent};
use tokio_util::sync::CancellationToken;

const ANALYZE_FAILED: &str = "Failed to analyze the video.";
const GENERATE_FAILED: &str = "Failed to generate the video.";
const CONSISTENCY_FAILED: &str = "Failed to check the prompt.";

/// File extension of generated videos.
const GENERATED_EXTENSION: &str = "mp4";

#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("Please upload a valid video file.")]
    NotAVideo,

    #[error("No video loaded to analyze.")]
    NoSourceVideo,

    #[error("Analyze the video before checking the prompt.")]
    NoFrame,

    #[error("There is no generated video to download.")]
    NoGeneratedVideo,

    #[error("{0}")]
    Prompt(String),

    #[error("{0}")]
    Extraction(#[from] FfmpegError),

    #[error("{0}")]
    Analysis(#[from] AnalysisError),

    #[error("{0}")]
    Generation(#[from] GenerationError),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for StudioError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => Self::Prompt(msg),
            other => Self::Prompt(other.to_string()),
        }
    }
}

/// One user's working session.
pub struct Studio {
    store: AssetStore,
    extractor: Box<dyn FrameExtractor>,
    poll_policy: PollPolicy,

    source: AssetSlot,
    frame: Option<ExtractedFrame>,
    analysis: Option<AnalysisResult>,
    prompt: String,
    consistency: Option<ConsistencyResult>,
    generated: AssetSlot,
    last_job_id: Option<JobId>,

    status: Option<String>,
    error: Option<String>,
}

impl Studio {
    /// Create an empty session that extracts frames with `ffmpeg`.
    pub fn new(store: AssetStore, poll_policy: PollPolicy) -> Self {
        Self {
            store,
            extractor: Box::new(Ffmpeg),
            poll_policy,
            source: AssetSlot::new(),
            frame: None,
            analysis: None,
            prompt: String::new(),
            consistency: None,
            generated: AssetSlot::new(),
            last_job_id: None,
            status: None,
            error: None,
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn FrameExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    // ---- read-only projection ----

    pub fn source_video(&self) -> Option<&LocalAsset> {
        self.source.get()
    }

    pub fn frame(&self) -> Option<&ExtractedFrame> {
        self.frame.as_ref()
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn consistency(&self) -> Option<&ConsistencyResult> {
        self.consistency.as_ref()
    }

    pub fn generated_video(&self) -> Option<&LocalAsset> {
        self.generated.get()
    }

    pub fn last_job_id(&self) -> Option<JobId> {
        self.last_job_id
    }

    /// Latest progress message of a running generation.
    pub fn status_message(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Message describing the last failed operation.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    // ---- operations ----

    /// Use the video at `path` as the new source.
    ///
    /// Anything derived from the previous source is discarded.
    pub async fn load_video(&mut self, path: &Path) -> Result<(), StudioError> {
        let is_video = mime_guess::from_path(path)
            .first()
            .is_some_and(|mime| mime.type_() == mime_guess::mime::VIDEO);
        if !is_video {
            return Err(self.record(None, StudioError::NotAVideo));
        }

        let asset = match LocalAsset::borrowed(AssetKind::SourceVideo, path).await {
            Ok(asset) => asset,
            Err(e) => return Err(self.record(None, e.into())),
        };

        tracing::info!(
            path = %path.display(),
            bytes = asset.byte_len(),
            "Source video loaded",
        );

        self.reset_derived();
        self.source.replace(asset);
        Ok(())
    }

    /// Describe the source video's midpoint frame and seed the prompt
    /// with the suggested cinematic prompt.
    pub async fn analyze(&mut self, model: &dyn ContentModel) -> Result<(), StudioError> {
        let Some(path) = self.source.get().map(|s| s.path().to_path_buf()) else {
            return Err(self.record(None, StudioError::NoSourceVideo));
        };

        self.error = None;
        self.analysis = None;
        self.consistency = None;

        let frame = match self.extractor.extract_midpoint(&path).await {
            Ok(frame) => frame,
            Err(e) => return Err(self.record(Some(ANALYZE_FAILED), e.into())),
        };
        tracing::debug!(
            timestamp_secs = frame.timestamp_secs,
            width = frame.width,
            height = frame.height,
            "Frame extracted",
        );

        let result = match analysis::analyze_frame(model, &frame.image).await {
            Ok(result) => result,
            Err(e) => {
                self.frame = Some(frame);
                return Err(self.record(Some(ANALYZE_FAILED), e.into()));
            }
        };

        self.prompt = result.cinematic_prompt.clone();
        self.frame = Some(frame);
        self.analysis = Some(result);
        Ok(())
    }

    /// Replace the editable prompt.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
        self.consistency = None;
    }

    /// Score the current prompt against the last analysed frame.
    pub async fn check_consistency(
        &mut self,
        model: &dyn ContentModel,
    ) -> Result<&ConsistencyResult, StudioError> {
        let prompt = match normalize_prompt(&self.prompt) {
            Ok(prompt) => prompt,
            Err(e) => return Err(self.record(None, e.into())),
        };
        let Some(frame) = self.frame.as_ref() else {
            return Err(self.record(None, StudioError::NoFrame));
        };

        self.error = None;
        match analysis::check_prompt_consistency(model, &frame.image, &prompt).await {
            Ok(result) => {
                tracing::info!(score = result.score, "Prompt consistency checked");
                Ok(self.consistency.insert(result))
            }
            Err(e) => Err(self.record(Some(CONSISTENCY_FAILED), e.into())),
        }
    }

    /// Generate a new video from the current prompt.
    ///
    /// Any previously generated video is released first.  Progress
    /// messages are mirrored into [`status_message`](Self::status_message)
    /// while the job runs and cleared once it ends.
    pub async fn generate<B>(
        &mut self,
        backend: &B,
        cancel: &CancellationToken,
    ) -> Result<&LocalAsset, StudioError>
    where
        B: VideoGenerationBackend + ?Sized,
    {
        let prompt = match normalize_prompt(&self.prompt) {
            Ok(prompt) => prompt,
            Err(e) => return Err(self.record(None, e.into())),
        };

        self.generated.clear();
        self.error = None;
        self.last_job_id = None;

        let policy = self.poll_policy.clone();
        let (tx, mut rx) = progress_channel();
        let job = run_generation_job(backend, &prompt, &policy, &tx, cancel);
        tokio::pin!(job);

        let result = loop {
            tokio::select! {
                result = &mut job => break result,
                Some(event) = rx.recv() => self.apply_event(&event),
            }
        };
        while let Ok(event) = rx.try_recv() {
            self.apply_event(&event);
        }
        self.status = None;

        let video = match result {
            Ok(video) => video,
            Err(e) => return Err(self.record(Some(GENERATE_FAILED), e.into())),
        };

        let asset = match self
            .store
            .store(AssetKind::GeneratedVideo, &video.bytes, GENERATED_EXTENSION)
            .await
        {
            Ok(asset) => asset,
            Err(e) => return Err(self.record(Some(GENERATE_FAILED), e.into())),
        };

        self.last_job_id = Some(video.job_id);
        self.generated.replace(asset);
        self.generated.get().ok_or(StudioError::NoGeneratedVideo)
    }

    /// Copy the generated video into `dest_dir` as
    /// `vidgen-ai-<unix millis>.mp4`.
    pub async fn download(&mut self, dest_dir: &Path) -> Result<PathBuf, StudioError> {
        let Some(asset) = self.generated.get() else {
            return Err(self.record(None, StudioError::NoGeneratedVideo));
        };

        let dest = dest_dir.join(format!(
            "vidgen-ai-{}.{GENERATED_EXTENSION}",
            Utc::now().timestamp_millis()
        ));

        match asset.export_to(&dest).await {
            Ok(bytes) => {
                tracing::info!(path = %dest.display(), bytes, "Generated video saved");
                Ok(dest)
            }
            Err(e) => Err(self.record(None, e.into())),
        }
    }

    /// Release every asset and return to the empty state.
    pub fn start_over(&mut self) {
        self.source.clear();
        self.reset_derived();
        tracing::debug!("Session reset");
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    // ---- private helpers ----

    fn reset_derived(&mut self) {
        self.frame = None;
        self.analysis = None;
        self.prompt.clear();
        self.consistency = None;
        self.generated.clear();
        self.last_job_id = None;
        self.status = None;
        self.error = None;
    }

    fn apply_event(&mut self, event: &GenerationEvent) {
        tracing::info!(
            job_id = %event.job_id,
            status = %event.status,
            message = %event.message,
            "Generation progress",
        );
        self.status = Some(event.message.clone());
    }

    /// Store the display message for `err` and hand it back.
    fn record(&mut self, prefix: Option<&str>, err: StudioError) -> StudioError {
        let message = match prefix {
            Some(prefix) => format!("{prefix} {err}"),
            None => err.to_string(),
        };
        tracing::warn!(error = %message, "Operation failed");
        self.error = Some(message);
        err
    }
}
