//! Core library for Whitney-style parametric animations.
//!
//! Three clocks share one normalised playhead: the [`Playhead`] itself, the
//! wall-clock [`PlaybackDriver`], and the frame-exact [`ExportDriver`] that
//! captures every logical frame to a video file. The [`FrameScheduler`] runs
//! once per display refresh and makes sure only one driver moves the playhead
//! and draws in any refresh interval.
//!
//! Rendering, audio acquisition, UI controls and file saving are external
//! collaborators expressed as traits; in-memory implementations are provided
//! for headless use and tests.

pub mod audio;
pub mod capture;
pub mod config;
pub mod controls;
pub mod error;
pub mod playback;
pub mod record;
pub mod render;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod timeline;

pub use audio::{AudioSource, MediaTrack, StaticAudioSource, TrackKind};
pub use capture::{CaptureStream, CaptureSurface, EncodingProfile, MemorySurface};
pub use config::{AppConfig, DurationSetting, ExportSettings, LoggingConfig, PlaybackConfig};
pub use controls::{ControlId, ControlPanel, ControlRegistry, SharedControls};
pub use error::{Result, WhitneyError};
pub use playback::{PlaybackDriver, PlaybackState, PlaybackTick};
pub use record::{
    ExportCommand, ExportDriver, ExportOutcome, ExportReport, ExportState, ExportStep, FramePlan,
};
pub use render::{Framebuffer, MemoryRenderer, Renderer, SharedFramebuffer};
pub use scheduler::{DrawSource, FrameScheduler, Stage, StopHandle};
pub use session::Session;
pub use store::{ArtifactStore, DirectoryStore, ExportArtifact, MemoryStore, TempResource};
pub use timeline::{FramePosition, Playhead, ScrubRange};
