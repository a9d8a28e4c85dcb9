use crate::{
    AppConfig, DrawSource, DurationSetting, ExportCommand, ExportDriver, FrameScheduler,
    PlaybackDriver, PlaybackState, Playhead, Renderer, Result, Stage, StopHandle,
};

/// Play/pause control, disabled during export.
pub const PLAY_CONTROL: &str = "playPause";
/// Duration input, disabled during export.
pub const DURATION_CONTROL: &str = "duration";

/// One animation session: a playhead, both drivers, and the loop multiplexing
/// them. Every method is a command an input layer can invoke directly.
pub struct Session {
    playhead: Playhead,
    playback: PlaybackDriver,
    export: ExportDriver,
    scheduler: FrameScheduler,
    duration: DurationSetting,
    renderer: Box<dyn Renderer>,
}

impl Session {
    pub fn new(
        config: &AppConfig,
        playhead: Playhead,
        mut export: ExportDriver,
        renderer: Box<dyn Renderer>,
    ) -> Self {
        export.lock([PLAY_CONTROL, DURATION_CONTROL]);
        Self {
            playhead,
            playback: PlaybackDriver::new(),
            export,
            scheduler: FrameScheduler::new(),
            duration: DurationSetting::from_secs(
                config.playback.default_duration_secs,
                config.playback.min_duration_ms,
            ),
            renderer,
        }
    }

    pub fn playhead(&self) -> &Playhead {
        &self.playhead
    }

    pub fn playback(&self) -> &PlaybackDriver {
        &self.playback
    }

    pub fn export(&self) -> &ExportDriver {
        &self.export
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration.millis()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.scheduler.stop_handle()
    }

    /// Plays or pauses. Ignored while an export holds the play control.
    pub fn toggle_playback(&mut self, now: f64) -> PlaybackState {
        if self.export.is_active() {
            tracing::debug!("play control is locked during export");
            return self.playback.state();
        }
        self.playback
            .toggle(now, &self.playhead, self.duration.millis())
    }

    pub fn pause(&mut self) {
        self.playback.pause();
    }

    /// Moves the playhead from an external scrub.
    ///
    /// Not blocked during export: the write lands between two export frames.
    /// In the advance phase the next frame overwrites it. In the hold phase
    /// the playhead is not rewritten, so the remaining held frames capture
    /// the scrubbed position.
    pub fn scrub(&mut self, now: f64, u: f64) {
        if self.export.is_active() {
            tracing::debug!(u, "scrub while export is active");
        }
        self.playhead.set(u);
        self.playback
            .rebase(now, &self.playhead, self.duration.millis());
    }

    /// Scrub using the raw value of the scrub control.
    pub fn scrub_control(&mut self, now: f64, value: f64) {
        self.playhead.set_from_control(value);
        self.scrub(now, self.playhead.get());
    }

    /// Applies a duration edit (seconds). Ignored while an export holds the
    /// duration control.
    pub fn set_duration_secs(&mut self, now: f64, secs: f64) {
        if self.export.is_active() {
            tracing::debug!(secs, "duration control is locked during export");
            return;
        }
        self.duration.set_secs(secs);
        self.playback
            .rebase(now, &self.playhead, self.duration.millis());
    }

    /// Starts an export run, or cancels the running one.
    pub fn toggle_export(&mut self) -> Result<ExportCommand> {
        self.export.toggle_start_or_cancel(self.duration.millis())
    }

    pub fn refresh(&mut self, now: f64) -> Result<DrawSource> {
        let mut stage = Stage {
            playhead: &mut self.playhead,
            playback: &mut self.playback,
            export: &mut self.export,
            renderer: self.renderer.as_mut(),
        };
        self.scheduler.on_refresh(now, &mut stage)
    }

    /// Runs the scheduler loop over a host refresh signal.
    pub fn run<I>(&mut self, refreshes: I) -> Result<u64>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut stage = Stage {
            playhead: &mut self.playhead,
            playback: &mut self.playback,
            export: &mut self.export,
            renderer: self.renderer.as_mut(),
        };
        self.scheduler.run(refreshes, &mut stage)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("playhead", &self.playhead)
            .field("playback", &self.playback)
            .field("export", &self.export)
            .field("duration", &self.duration)
            .finish()
    }
}
