use crate::config::guard_duration;
use crate::Playhead;

/// Play/pause state of the real-time driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
}

impl PlaybackState {
    /// Label for the play/pause control: the action the next toggle performs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Play",
            Self::Playing => "Pause",
        }
    }
}

/// Outcome of a single [`PlaybackDriver::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackTick {
    /// Not playing; the playhead was left alone.
    Idle,
    /// The playhead moved to the contained position.
    Advanced(f64),
    /// The end was reached; the playhead sits at 1 and playback paused.
    Finished,
}

/// Wall-clock reference playback progress is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Anchor {
    /// Wall-clock time of the anchor, in milliseconds.
    pub t0: f64,
    /// Playhead position at `t0`.
    pub u0: f64,
    /// Duration snapshot in milliseconds.
    pub duration_ms: f64,
}

/// Advances the playhead over real time.
#[derive(Debug, Default)]
pub struct PlaybackDriver {
    state: PlaybackState,
    anchor: Anchor,
}

impl PlaybackDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// Flips between idle and playing. Starting playback anchors at `now`.
    pub fn toggle(&mut self, now: f64, playhead: &Playhead, duration_ms: f64) -> PlaybackState {
        match self.state {
            PlaybackState::Idle => {
                self.state = PlaybackState::Playing;
                self.rebase(now, playhead, duration_ms);
                tracing::info!(u = playhead.get(), duration_ms, "playback started");
            }
            PlaybackState::Playing => {
                self.state = PlaybackState::Idle;
                tracing::info!(u = playhead.get(), "playback paused");
            }
        }
        self.state
    }

    /// Re-anchors progress to the current clock, position and duration.
    /// Has no effect while idle.
    pub fn rebase(&mut self, now: f64, playhead: &Playhead, duration_ms: f64) {
        if !self.is_playing() {
            return;
        }
        self.anchor = Anchor {
            t0: now,
            u0: playhead.get(),
            duration_ms: guard_duration(duration_ms),
        };
    }

    pub fn pause(&mut self) {
        if self.is_playing() {
            self.state = PlaybackState::Idle;
            tracing::info!("playback paused");
        }
    }

    pub fn tick(&mut self, now: f64, playhead: &mut Playhead) -> PlaybackTick {
        if !self.is_playing() {
            return PlaybackTick::Idle;
        }

        let Anchor { t0, u0, duration_ms } = self.anchor;
        let next = u0 + (now - t0) / duration_ms;
        if next >= 1.0 {
            playhead.set(1.0);
            self.state = PlaybackState::Idle;
            tracing::info!("playback reached the end");
            PlaybackTick::Finished
        } else {
            playhead.set(next);
            PlaybackTick::Advanced(playhead.get())
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn playing(now: f64, playhead: &Playhead, duration_ms: f64) -> PlaybackDriver {
        let mut driver = PlaybackDriver::new();
        assert_eq!(driver.toggle(now, playhead, duration_ms), PlaybackState::Playing);
        driver
    }

    #[test]
    fn progresses_with_wall_clock_and_auto_pauses() {
        let mut playhead = Playhead::new();
        let mut driver = playing(500.0, &playhead, 2000.0);

        assert_eq!(driver.tick(1500.0, &mut playhead), PlaybackTick::Advanced(0.5));
        assert_eq!(playhead.get(), 0.5);

        assert_eq!(driver.tick(2500.0, &mut playhead), PlaybackTick::Finished);
        assert_eq!(playhead.get(), 1.0);
        assert_eq!(driver.state(), PlaybackState::Idle);

        assert_eq!(driver.tick(3500.0, &mut playhead), PlaybackTick::Idle);
        assert_eq!(playhead.get(), 1.0);
    }

    #[test]
    fn rebase_while_idle_changes_nothing() {
        let mut playhead = Playhead::new();
        let mut driver = playing(0.0, &playhead, 1000.0);
        driver.tick(250.0, &mut playhead);
        driver.pause();
        let before = driver.anchor();

        playhead.set(0.9);
        driver.rebase(9_000.0, &playhead, 4000.0);

        assert_eq!(driver.anchor(), before);
        assert_eq!(driver.state(), PlaybackState::Idle);
    }

    #[test]
    fn rebase_while_playing_avoids_a_jump() {
        let mut playhead = Playhead::new();
        let mut driver = playing(0.0, &playhead, 1000.0);
        driver.tick(500.0, &mut playhead);

        // scrub back and double the duration
        playhead.set(0.2);
        driver.rebase(500.0, &playhead, 2000.0);
        assert!(driver.is_playing());

        driver.tick(500.0, &mut playhead);
        assert_eq!(playhead.get(), 0.2);
        driver.tick(1500.0, &mut playhead);
        assert!((playhead.get() - 0.7).abs() < 1e-12);
    }

    #[test]
    fn toggle_pauses_and_resumes_from_current_position() {
        let mut playhead = Playhead::new();
        let mut driver = playing(0.0, &playhead, 1000.0);
        driver.tick(400.0, &mut playhead);

        assert_eq!(driver.toggle(400.0, &playhead, 1000.0), PlaybackState::Idle);
        driver.tick(900.0, &mut playhead);
        assert_eq!(playhead.get(), 0.4);

        driver.toggle(2_000.0, &playhead, 1000.0);
        assert_eq!(driver.anchor().u0, 0.4);
        driver.tick(2_100.0, &mut playhead);
        assert!((playhead.get() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn pause_when_idle_is_a_no_op() {
        let mut driver = PlaybackDriver::new();
        driver.pause();
        assert_eq!(driver.state(), PlaybackState::Idle);
        assert_eq!(driver.state().label(), "Play");
    }

    #[test]
    fn non_positive_duration_falls_back_to_minimum() {
        let playhead = Playhead::new();
        let driver = playing(0.0, &playhead, 0.0);
        assert_eq!(driver.anchor().duration_ms, crate::config::MIN_DURATION_MS);
    }

    proptest! {
        #[test]
        fn ticks_stay_in_range_and_finish_once(
            start in 0.0f64..1.0,
            duration in 100.0f64..10_000.0,
            steps in proptest::collection::vec(0.0f64..500.0, 1..64),
        ) {
            let mut playhead = Playhead::new();
            playhead.set(start);
            let mut driver = playing(0.0, &playhead, duration);

            let mut now = 0.0;
            let mut finished = 0;
            for step in steps {
                now += step;
                if driver.tick(now, &mut playhead) == PlaybackTick::Finished {
                    finished += 1;
                }
                prop_assert!((0.0..=1.0).contains(&playhead.get()));
            }
            prop_assert!(finished <= 1);
            if finished == 1 {
                prop_assert_eq!(playhead.get(), 1.0);
                prop_assert!(!driver.is_playing());
            }
        }
    }
}
