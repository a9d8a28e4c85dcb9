use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::{CaptureStream, CaptureSurface, EncodingProfile, WEBM, WEBM_VP9, WEBM_VP9_OPUS};
use crate::{FramePosition, MediaTrack, Result, SharedFramebuffer, WhitneyError};

/// One captured frame in the frame log written by [`MemorySurface`] streams.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub index: u64,
    pub u: f64,
    pub t: Option<f64>,
}

/// Everything a single stream did, kept for inspection after the run.
#[derive(Debug, Clone, Default)]
pub struct CaptureRun {
    pub profile: Option<EncodingProfile>,
    pub video_bits_per_second: u64,
    pub frames: Vec<FramePosition>,
    pub finalized: bool,
}

/// Shared record of all streams opened on a [`MemorySurface`].
#[derive(Debug, Default)]
pub struct CaptureLog {
    pub runs: Vec<CaptureRun>,
    pub tracks: Vec<MediaTrack>,
}

impl CaptureLog {
    /// Tracks handed to any stream that have not been stopped.
    pub fn live_tracks(&self) -> usize {
        self.tracks.iter().filter(|track| track.is_live()).count()
    }

    pub fn last_run(&self) -> Option<&CaptureRun> {
        self.runs.last()
    }
}

/// Headless capture backend reading frames from a shared framebuffer.
///
/// Each stream encodes into a frame log: one JSON line per captured frame.
#[derive(Debug)]
pub struct MemorySurface {
    framebuffer: SharedFramebuffer,
    supported: Vec<String>,
    log: Rc<RefCell<CaptureLog>>,
    fail_after: Option<usize>,
}

impl MemorySurface {
    pub fn new(framebuffer: SharedFramebuffer) -> Self {
        Self {
            framebuffer,
            supported: vec![
                WEBM_VP9_OPUS.to_string(),
                WEBM_VP9.to_string(),
                WEBM.to_string(),
            ],
            log: Rc::new(RefCell::new(CaptureLog::default())),
            fail_after: None,
        }
    }

    /// Restricts the mime types the simulated encoder accepts.
    pub fn with_supported<I, S>(mut self, mimes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported = mimes.into_iter().map(Into::into).collect();
        self
    }

    /// Makes every stream fail once it has captured `frames` frames.
    pub fn failing_after(mut self, frames: usize) -> Self {
        self.fail_after = Some(frames);
        self
    }

    pub fn log(&self) -> Rc<RefCell<CaptureLog>> {
        self.log.clone()
    }
}

impl CaptureSurface for MemorySurface {
    fn is_type_supported(&self, mime: &str) -> bool {
        self.supported.iter().any(|supported| supported == mime)
    }

    fn capture_stream(&mut self) -> Result<Box<dyn CaptureStream>> {
        let video = MediaTrack::video("surface");
        let run = {
            let mut log = self.log.borrow_mut();
            log.tracks.push(video.clone());
            log.runs.push(CaptureRun::default());
            log.runs.len() - 1
        };

        Ok(Box::new(MemoryStream {
            framebuffer: self.framebuffer.clone(),
            log: self.log.clone(),
            run,
            tracks: vec![video],
            pending: Vec::new(),
            recording: false,
            captured: 0,
            fail_after: self.fail_after,
        }))
    }
}

struct MemoryStream {
    framebuffer: SharedFramebuffer,
    log: Rc<RefCell<CaptureLog>>,
    run: usize,
    tracks: Vec<MediaTrack>,
    pending: Vec<Vec<u8>>,
    recording: bool,
    captured: usize,
    fail_after: Option<usize>,
}

impl MemoryStream {
    fn with_run<R>(&self, f: impl FnOnce(&mut CaptureRun) -> R) -> R {
        let mut log = self.log.borrow_mut();
        f(&mut log.runs[self.run])
    }
}

impl CaptureStream for MemoryStream {
    fn add_track(&mut self, track: MediaTrack) {
        self.log.borrow_mut().tracks.push(track.clone());
        self.tracks.push(track);
    }

    fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    fn start(&mut self, profile: &EncodingProfile, video_bits_per_second: u64) -> Result<()> {
        if self.recording {
            return Err(WhitneyError::capture("stream is already recording"));
        }
        self.recording = true;
        self.with_run(|run| {
            run.profile = Some(profile.clone());
            run.video_bits_per_second = video_bits_per_second;
        });
        Ok(())
    }

    fn request_frame(&mut self) -> Result<()> {
        if !self.recording {
            return Err(WhitneyError::capture("stream is not recording"));
        }
        if self.fail_after.is_some_and(|limit| self.captured >= limit) {
            return Err(WhitneyError::capture("simulated encoder failure"));
        }

        let frame = self
            .framebuffer
            .borrow()
            .content()
            .ok_or_else(|| WhitneyError::capture("nothing has been drawn to the surface"))?;

        let record = FrameRecord {
            index: self.captured as u64,
            u: frame.u,
            t: frame.t,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        self.pending.push(line);
        self.captured += 1;
        self.with_run(|run| run.frames.push(frame));
        Ok(())
    }

    fn take_chunks(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending)
    }

    fn stop(&mut self) -> Result<()> {
        if !self.recording {
            return Err(WhitneyError::capture("stream is not recording"));
        }
        self.recording = false;
        self.with_run(|run| run.finalized = true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Framebuffer, MemoryRenderer, Renderer};

    #[test]
    fn captures_current_surface_content() {
        let framebuffer = Framebuffer::shared();
        let mut renderer = MemoryRenderer::new(framebuffer.clone());
        let mut surface = MemorySurface::new(framebuffer);
        let log = surface.log();

        let mut stream = surface.capture_stream().unwrap();
        let profile = EncodingProfile {
            mime: WEBM_VP9.to_string(),
            has_audio: false,
        };
        stream.start(&profile, 8_000_000).unwrap();

        renderer.draw(FramePosition { u: 0.5, t: None }).unwrap();
        stream.request_frame().unwrap();
        stream.request_frame().unwrap();

        let chunks = stream.take_chunks();
        assert_eq!(chunks.len(), 2);
        let second: FrameRecord = serde_json::from_slice(&chunks[1]).unwrap();
        assert_eq!(second, FrameRecord { index: 1, u: 0.5, t: None });
        assert!(stream.take_chunks().is_empty());

        stream.stop().unwrap();
        let log = log.borrow();
        let run = log.last_run().unwrap();
        assert!(run.finalized);
        assert_eq!(run.frames.len(), 2);
        assert_eq!(run.video_bits_per_second, 8_000_000);
    }

    #[test]
    fn refuses_frames_before_start() {
        let framebuffer = Framebuffer::shared();
        let mut surface = MemorySurface::new(framebuffer);
        let mut stream = surface.capture_stream().unwrap();
        assert!(stream.request_frame().is_err());
    }

    #[test]
    fn reports_audio_once_a_track_is_added() {
        let mut surface = MemorySurface::new(Framebuffer::shared());
        let log = surface.log();
        let mut stream = surface.capture_stream().unwrap();
        assert!(!stream.has_audio());

        stream.add_track(MediaTrack::audio("mic"));
        assert!(stream.has_audio());
        assert_eq!(log.borrow().live_tracks(), 2);
    }

    #[test]
    fn supported_types_can_be_restricted() {
        let surface = MemorySurface::new(Framebuffer::shared()).with_supported([WEBM]);
        assert!(surface.is_type_supported(WEBM));
        assert!(!surface.is_type_supported(WEBM_VP9));
    }
}
