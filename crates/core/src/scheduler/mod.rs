use std::cell::Cell;
use std::rc::Rc;

use crate::{ExportDriver, ExportStep, PlaybackDriver, Playhead, Renderer, Result};

/// Which driver drew during a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawSource {
    Playback,
    Export,
}

/// Mutable view over everything a refresh touches.
pub struct Stage<'a> {
    pub playhead: &'a mut Playhead,
    pub playback: &'a mut PlaybackDriver,
    pub export: &'a mut ExportDriver,
    pub renderer: &'a mut dyn Renderer,
}

/// Requests the scheduler loop to end before the next refresh.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Rc<Cell<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stopped.set(true);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }
}

/// Runs one iteration per display refresh, multiplexing the playhead between
/// the playback and export drivers.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    running: bool,
    stop: StopHandle,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Handles one refresh.
    ///
    /// A pending export run is resumed first; while it is active it owns the
    /// playhead and the draw, and playback is not ticked. Otherwise playback
    /// advances and the current position is drawn. Exactly one driver draws
    /// per refresh.
    ///
    /// Export failures end the run (see [`ExportDriver::last_report`]) and do
    /// not stop the loop.
    pub fn on_refresh(&mut self, now: f64, stage: &mut Stage<'_>) -> Result<DrawSource> {
        match stage.export.on_refresh(now, stage.playhead, stage.renderer) {
            Ok(ExportStep::Captured { .. }) => return Ok(DrawSource::Export),
            Ok(ExportStep::Idle | ExportStep::Finished(_)) => {}
            Err(err) => tracing::warn!(error = %err, "export run aborted"),
        }

        if stage.export.is_active() {
            return Ok(DrawSource::Export);
        }

        stage.playback.tick(now, stage.playhead);
        stage.renderer.draw(stage.playhead.position())?;
        Ok(DrawSource::Playback)
    }

    /// Drives [`FrameScheduler::on_refresh`] for every timestamp the host
    /// refresh signal yields, until it ends or a stop is requested. Returns
    /// the number of refreshes handled.
    pub fn run<I>(&mut self, refreshes: I, stage: &mut Stage<'_>) -> Result<u64>
    where
        I: IntoIterator<Item = f64>,
    {
        self.running = true;
        tracing::debug!("scheduler loop started");

        let mut handled = 0;
        let mut result = Ok(());
        for now in refreshes {
            if self.stop.is_stopped() {
                break;
            }
            if let Err(err) = self.on_refresh(now, stage) {
                result = Err(err);
                break;
            }
            handled += 1;
        }

        self.running = false;
        tracing::debug!(handled, "scheduler loop ended");
        result.map(|()| handled)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::capture::MemorySurface;
    use crate::store::MemoryStore;
    use crate::{ControlRegistry, ExportSettings, FramePosition, Framebuffer, MemoryRenderer};

    fn export_driver() -> ExportDriver {
        ExportDriver::new(
            ExportSettings {
                hold_frames: 2,
                ..ExportSettings::default()
            },
            Box::new(MemorySurface::new(Framebuffer::shared())),
            Box::new(MemoryStore::new()),
            Rc::new(RefCell::new(ControlRegistry::new())),
        )
    }

    #[test]
    fn idle_refresh_ticks_playback_and_draws() {
        let mut playhead = Playhead::new();
        let mut playback = PlaybackDriver::new();
        let mut export = export_driver();
        let mut drawn = Vec::new();
        let mut renderer = |frame: FramePosition| -> Result<()> {
            drawn.push(frame.u);
            Ok(())
        };

        playback.toggle(0.0, &playhead, 1000.0);
        let mut scheduler = FrameScheduler::new();
        let mut stage = Stage {
            playhead: &mut playhead,
            playback: &mut playback,
            export: &mut export,
            renderer: &mut renderer,
        };
        assert_eq!(scheduler.on_refresh(250.0, &mut stage).unwrap(), DrawSource::Playback);
        assert_eq!(scheduler.on_refresh(500.0, &mut stage).unwrap(), DrawSource::Playback);
        drop(stage);

        assert_eq!(drawn, vec![0.25, 0.5]);
    }

    #[test]
    fn stop_handle_ends_the_loop() {
        let framebuffer = Framebuffer::shared();
        let mut renderer = MemoryRenderer::new(framebuffer.clone());
        let mut playhead = Playhead::new();
        let mut playback = PlaybackDriver::new();
        let mut export = export_driver();
        let mut scheduler = FrameScheduler::new();
        let stop = scheduler.stop_handle();

        let refreshes = (0..).map(|frame| frame as f64 * 16.0).inspect(|now| {
            if *now >= 64.0 {
                stop.stop();
            }
        });
        let handled = scheduler
            .run(
                refreshes,
                &mut Stage {
                    playhead: &mut playhead,
                    playback: &mut playback,
                    export: &mut export,
                    renderer: &mut renderer,
                },
            )
            .unwrap();

        assert_eq!(handled, 4);
        assert!(!scheduler.is_running());
        assert_eq!(framebuffer.borrow().draws(), 4);
    }
}
