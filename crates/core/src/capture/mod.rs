//! Host capture and encoding seam.
//!
//! A [`CaptureSurface`] is the render surface seen from the recording side: it
//! hands out manually paced [`CaptureStream`]s (frames are pushed with
//! [`CaptureStream::request_frame`], never sampled on a timer) and reports
//! which container/codec combinations its encoder accepts.

mod memory;

pub use memory::{CaptureLog, CaptureRun, FrameRecord, MemorySurface};

use serde::{Deserialize, Serialize};

use crate::{MediaTrack, Result, TrackKind, WhitneyError};

pub const WEBM_VP9_OPUS: &str = "video/webm;codecs=vp9,opus";
pub const WEBM_VP9: &str = "video/webm;codecs=vp9";
pub const WEBM: &str = "video/webm";

/// Render surface able to produce a manually paced capture stream.
pub trait CaptureSurface {
    /// Whether the host encoder accepts the given mime type.
    fn is_type_supported(&self, mime: &str) -> bool;

    /// Opens a stream carrying one video track whose frames are only captured
    /// on request.
    fn capture_stream(&mut self) -> Result<Box<dyn CaptureStream>>;
}

/// Manually paced media stream plus the encoder recording it.
pub trait CaptureStream {
    fn add_track(&mut self, track: MediaTrack);

    /// Every track carried by the stream, video and audio.
    fn tracks(&self) -> &[MediaTrack];

    fn has_audio(&self) -> bool {
        self.tracks()
            .iter()
            .any(|track| track.kind() == TrackKind::Audio)
    }

    /// Starts encoding with the selected profile.
    fn start(&mut self, profile: &EncodingProfile, video_bits_per_second: u64) -> Result<()>;

    /// Captures exactly one frame of the current surface content.
    fn request_frame(&mut self) -> Result<()>;

    /// Drains the encoded chunks that became available since the last call.
    fn take_chunks(&mut self) -> Vec<Vec<u8>>;

    /// Stops the encoder and blocks until it has flushed its final data.
    fn stop(&mut self) -> Result<()>;
}

/// Container and codec selection for an export run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingProfile {
    pub mime: String,
    pub has_audio: bool,
}

/// Candidates in preference order: the specific codec first, the generic
/// container last.
pub fn profile_candidates(has_audio: bool) -> [&'static str; 2] {
    if has_audio {
        [WEBM_VP9_OPUS, WEBM]
    } else {
        [WEBM_VP9, WEBM]
    }
}

/// Picks the first candidate the host accepts.
pub fn select_profile(
    has_audio: bool,
    is_supported: impl Fn(&str) -> bool,
) -> Result<EncodingProfile> {
    let candidates = profile_candidates(has_audio);
    candidates
        .iter()
        .find(|mime| is_supported(mime))
        .map(|mime| EncodingProfile {
            mime: (*mime).to_string(),
            has_audio,
        })
        .ok_or_else(|| WhitneyError::UnsupportedCapture {
            tried: candidates.iter().map(|mime| mime.to_string()).collect(),
        })
}
