//! Frame-exact export.
//!
//! The [`ExportDriver`] steps the playhead through every logical frame of the
//! animation and captures each one, one frame per display refresh. Output
//! timing depends only on the frame index: a slow draw or encoder stretches
//! the run in wall-clock time but never drops or duplicates a frame.

use crate::capture::{select_profile, CaptureStream, CaptureSurface, EncodingProfile};
use crate::config::{guard_duration, ExportSettings};
use crate::controls::{ControlId, ControlLock, SharedControls};
use crate::store::{ArtifactStore, ExportArtifact, TempResource};
use crate::{AudioSource, Playhead, Renderer, Result, WhitneyError};

/// Coarse state of the export driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Active,
    /// Active with a pending cancellation request.
    Cancelling,
}

impl ExportState {
    /// Label for the render control: the action the next command performs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Render",
            Self::Active | Self::Cancelling => "Cancel",
        }
    }
}

/// Frame arithmetic of one export run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    /// Exact (fractional) number of frames spanned by the duration.
    pub total_frames: f64,
    /// `ceil(total_frames)`; the advance phase visits `0..=frame_count`.
    pub frame_count: u64,
    pub hold_frames: u32,
}

impl FramePlan {
    pub fn new(duration_ms: f64, fps: u32, hold_frames: u32) -> Self {
        let total_frames = f64::from(fps) * duration_ms / 1000.0;
        Self {
            total_frames,
            frame_count: total_frames.ceil() as u64,
            hold_frames,
        }
    }

    /// Playhead position of advance frame `frame`.
    pub fn position(&self, frame: u64) -> f64 {
        (frame as f64 / self.total_frames).min(1.0)
    }

    /// Frames captured by a run that is not cancelled.
    pub fn total_captures(&self) -> u64 {
        self.frame_count + 1 + u64::from(self.hold_frames)
    }
}

/// Result of [`ExportDriver::toggle_start_or_cancel`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExportCommand {
    Started(FramePlan),
    CancelRequested,
    /// A cancellation is already pending; nothing changed.
    AlreadyCancelling,
}

/// Result of one [`ExportDriver::on_refresh`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExportStep {
    /// No export in progress.
    Idle,
    /// One frame was drawn and captured.
    Captured { index: u64, u: f64 },
    /// The run ended during this refresh; nothing was drawn.
    Finished(ExportReport),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Saved { file_name: String, bytes: usize },
    Cancelled,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub outcome: ExportOutcome,
    pub frames_captured: u64,
    pub profile: Option<EncodingProfile>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// Next advance frame index.
    Advance(u64),
    /// Hold frames captured so far.
    Hold(u32),
}

enum FrameTarget {
    /// Move the playhead, then capture.
    Seek(f64),
    /// Capture again without touching the playhead.
    Repeat,
}

enum Ending {
    Completed,
    Cancelled,
    Failed(WhitneyError),
}

/// Owns the capture stream for the duration of a run. Dropping it stops every
/// track on the stream and then re-enables the locked controls.
struct CaptureGuard {
    stream: Box<dyn CaptureStream>,
    _lock: ControlLock,
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        for track in self.stream.tracks() {
            track.stop();
        }
    }
}

struct ActiveExport {
    plan: FramePlan,
    phase: Phase,
    guard: CaptureGuard,
    profile: EncodingProfile,
    chunks: Vec<Vec<u8>>,
    frames_captured: u64,
    cancelled: bool,
}

impl ActiveExport {
    fn next_target(&mut self) -> Option<FrameTarget> {
        loop {
            match self.phase {
                Phase::Advance(frame) if frame <= self.plan.frame_count => {
                    self.phase = Phase::Advance(frame + 1);
                    return Some(FrameTarget::Seek(self.plan.position(frame)));
                }
                Phase::Advance(_) => {
                    tracing::debug!(frames = self.frames_captured, "advance phase complete, holding final frame");
                    self.phase = Phase::Hold(0);
                    if self.plan.hold_frames > 0 {
                        self.phase = Phase::Hold(1);
                        return Some(FrameTarget::Seek(1.0));
                    }
                }
                Phase::Hold(held) if held < self.plan.hold_frames => {
                    self.phase = Phase::Hold(held + 1);
                    return Some(FrameTarget::Repeat);
                }
                Phase::Hold(_) => return None,
            }
        }
    }

    fn capture(&mut self, playhead: &mut Playhead, renderer: &mut dyn Renderer) -> Result<()> {
        renderer.draw(playhead.position())?;
        self.guard.stream.request_frame()?;
        self.collect_chunks();
        self.frames_captured += 1;
        Ok(())
    }

    fn collect_chunks(&mut self) {
        let chunks = self.guard.stream.take_chunks();
        self.chunks
            .extend(chunks.into_iter().filter(|chunk| !chunk.is_empty()));
    }
}

/// Deterministic, frame-indexed export state machine.
pub struct ExportDriver {
    settings: ExportSettings,
    surface: Box<dyn CaptureSurface>,
    audio: Option<Box<dyn AudioSource>>,
    store: Box<dyn ArtifactStore>,
    controls: SharedControls,
    locked: Vec<ControlId>,
    active: Option<ActiveExport>,
    pending_releases: Vec<(f64, TempResource)>,
    last_report: Option<ExportReport>,
}

impl ExportDriver {
    pub fn new(
        settings: ExportSettings,
        surface: Box<dyn CaptureSurface>,
        store: Box<dyn ArtifactStore>,
        controls: SharedControls,
    ) -> Self {
        Self {
            settings: settings.sanitized(),
            surface,
            audio: None,
            store,
            controls,
            locked: Vec::new(),
            active: None,
            pending_releases: Vec::new(),
            last_report: None,
        }
    }

    pub fn with_audio(mut self, source: Box<dyn AudioSource>) -> Self {
        self.audio = Some(source);
        self
    }

    /// Adds controls to disable for the duration of every future run.
    pub fn lock<I>(&mut self, controls: I)
    where
        I: IntoIterator,
        I::Item: Into<ControlId>,
    {
        self.locked.extend(controls.into_iter().map(Into::into));
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn state(&self) -> ExportState {
        match &self.active {
            None => ExportState::Idle,
            Some(active) if active.cancelled => ExportState::Cancelling,
            Some(_) => ExportState::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn plan(&self) -> Option<FramePlan> {
        self.active.as_ref().map(|active| active.plan)
    }

    /// Fraction of the run's frames captured so far.
    pub fn progress(&self) -> Option<f64> {
        self.active.as_ref().map(|active| {
            active.frames_captured as f64 / active.plan.total_captures() as f64
        })
    }

    pub fn last_report(&self) -> Option<&ExportReport> {
        self.last_report.as_ref()
    }

    /// Starts a run when idle, requests cancellation when active.
    pub fn toggle_start_or_cancel(&mut self, duration_ms: f64) -> Result<ExportCommand> {
        match self.active.as_mut() {
            Some(active) if active.cancelled => Ok(ExportCommand::AlreadyCancelling),
            Some(active) => {
                active.cancelled = true;
                tracing::info!(frames = active.frames_captured, "export cancellation requested");
                Ok(ExportCommand::CancelRequested)
            }
            None => self.start(duration_ms),
        }
    }

    fn start(&mut self, duration_ms: f64) -> Result<ExportCommand> {
        match self.open_run(duration_ms) {
            Ok(active) => {
                let plan = active.plan;
                tracing::info!(
                    frames = plan.frame_count,
                    total_frames = plan.total_frames,
                    mime = %active.profile.mime,
                    "export started"
                );
                self.active = Some(active);
                Ok(ExportCommand::Started(plan))
            }
            Err(err) => {
                tracing::error!(error = %err, "export could not start");
                self.last_report = Some(ExportReport {
                    outcome: ExportOutcome::Failed(err.to_string()),
                    frames_captured: 0,
                    profile: None,
                });
                Err(err)
            }
        }
    }

    /// Acquires everything a run needs. Any early return drops what was
    /// acquired so far, which unlocks the controls and stops the tracks.
    fn open_run(&mut self, duration_ms: f64) -> Result<ActiveExport> {
        let lock = ControlLock::engage(self.controls.clone(), self.locked.clone())?;

        let plan = FramePlan::new(
            guard_duration(duration_ms),
            self.settings.fps,
            self.settings.hold_frames,
        );

        let stream = self.surface.capture_stream()?;
        let mut guard = CaptureGuard {
            stream,
            _lock: lock,
        };

        if let Some(audio) = self.audio.as_mut() {
            for track in audio.audio_tracks() {
                guard.stream.add_track(track);
            }
        }

        let surface = &self.surface;
        let profile = select_profile(guard.stream.has_audio(), |mime| {
            surface.is_type_supported(mime)
        })?;
        guard
            .stream
            .start(&profile, self.settings.video_bits_per_second)?;

        Ok(ActiveExport {
            plan,
            phase: Phase::Advance(0),
            guard,
            profile,
            chunks: Vec::new(),
            frames_captured: 0,
            cancelled: false,
        })
    }

    /// Resumes the run for one display refresh: captures at most one frame,
    /// or finalizes once the run is over or cancelled.
    ///
    /// Capture and render failures end the run with full cleanup and are
    /// returned as errors.
    pub fn on_refresh(
        &mut self,
        now: f64,
        playhead: &mut Playhead,
        renderer: &mut dyn Renderer,
    ) -> Result<ExportStep> {
        self.service_releases(now);

        let Some(active) = self.active.as_mut() else {
            return Ok(ExportStep::Idle);
        };

        if active.cancelled {
            return self.finish(now, Ending::Cancelled);
        }

        let Some(target) = active.next_target() else {
            return self.finish(now, Ending::Completed);
        };

        if let FrameTarget::Seek(u) = target {
            playhead.set(u);
        }
        match active.capture(playhead, renderer) {
            Ok(()) => Ok(ExportStep::Captured {
                index: active.frames_captured - 1,
                u: playhead.get(),
            }),
            Err(err) => self.finish(now, Ending::Failed(err)),
        }
    }

    fn finish(&mut self, now: f64, ending: Ending) -> Result<ExportStep> {
        let Some(mut active) = self.active.take() else {
            return Ok(ExportStep::Idle);
        };

        let stopped = active.guard.stream.stop();
        active.collect_chunks();

        let result = match (ending, stopped) {
            (Ending::Failed(err), _) => Err(err),
            (_, Err(err)) => Err(err),
            (Ending::Cancelled, Ok(())) => Ok(ExportOutcome::Cancelled),
            (Ending::Completed, Ok(())) => self.save(now, &mut active),
        };

        let frames_captured = active.frames_captured;
        let profile = active.profile.clone();
        drop(active);

        let outcome = match &result {
            Ok(outcome) => outcome.clone(),
            Err(err) => ExportOutcome::Failed(err.to_string()),
        };
        let report = ExportReport {
            outcome,
            frames_captured,
            profile: Some(profile),
        };
        self.last_report = Some(report.clone());

        match result {
            Ok(outcome) => {
                tracing::info!(?outcome, frames = frames_captured, "export finished");
                Ok(ExportStep::Finished(report))
            }
            Err(err) => {
                tracing::error!(error = %err, frames = frames_captured, "export failed");
                Err(err)
            }
        }
    }

    fn save(&mut self, now: f64, active: &mut ActiveExport) -> Result<ExportOutcome> {
        let artifact = ExportArtifact {
            file_name: self.settings.file_name.clone(),
            mime: active.profile.mime.clone(),
            data: std::mem::take(&mut active.chunks).concat(),
        };
        let file_name = artifact.file_name.clone();
        let bytes = artifact.data.len();

        if let Some(resource) = self.store.save(artifact)? {
            let due = now + self.settings.release_delay_ms;
            tracing::debug!(resource = %resource.id, due, "scheduled release");
            self.pending_releases.push((due, resource));
        }

        Ok(ExportOutcome::Saved { file_name, bytes })
    }

    /// Releases temporary save handles whose delay has elapsed.
    pub fn service_releases(&mut self, now: f64) {
        if self.pending_releases.is_empty() {
            return;
        }
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_releases)
            .into_iter()
            .partition(|(deadline, _)| *deadline <= now);
        self.pending_releases = waiting;
        for (_, resource) in due {
            self.store.release(resource);
        }
    }
}

impl std::fmt::Debug for ExportDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportDriver")
            .field("settings", &self.settings)
            .field("state", &self.state())
            .field("locked", &self.locked)
            .field("pending_releases", &self.pending_releases.len())
            .field("last_report", &self.last_report)
            .finish()
    }
}
