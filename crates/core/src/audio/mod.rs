use std::cell::Cell;
use std::rc::Rc;

/// Kind of media carried by a [`MediaTrack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Handle to a live media track.
///
/// Clones share liveness, so the owner of a source can observe a track being
/// stopped by the capture stream it was handed to.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    kind: TrackKind,
    label: String,
    live: Rc<Cell<bool>>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            live: Rc::new(Cell::new(true)),
        }
    }

    pub fn audio(label: impl Into<String>) -> Self {
        Self::new(TrackKind::Audio, label)
    }

    pub fn video(label: impl Into<String>) -> Self {
        Self::new(TrackKind::Video, label)
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_live(&self) -> bool {
        self.live.get()
    }

    /// Ends the track. Stopping twice is harmless.
    pub fn stop(&self) {
        if self.live.replace(false) {
            tracing::debug!(label = %self.label, kind = ?self.kind, "track stopped");
        }
    }
}

/// Supplies live audio tracks to mix into an export. Queried once per run,
/// at export start.
pub trait AudioSource {
    fn audio_tracks(&mut self) -> Vec<MediaTrack>;
}

/// Audio source handing out a fixed set of tracks.
#[derive(Debug, Default, Clone)]
pub struct StaticAudioSource {
    tracks: Vec<MediaTrack>,
}

impl StaticAudioSource {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }
}

impl AudioSource for StaticAudioSource {
    fn audio_tracks(&mut self) -> Vec<MediaTrack> {
        self.tracks
            .iter()
            .filter(|track| track.is_live())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_liveness() {
        let track = MediaTrack::audio("mic");
        let handed_out = track.clone();
        handed_out.stop();
        assert!(!track.is_live());
        handed_out.stop();
        assert!(!handed_out.is_live());
    }

    #[test]
    fn static_source_skips_ended_tracks() {
        let live = MediaTrack::audio("music");
        let ended = MediaTrack::audio("old");
        ended.stop();
        let mut source = StaticAudioSource::new(vec![live, ended]);

        let tracks = source.audio_tracks();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].label(), "music");
        assert_eq!(tracks[0].kind(), TrackKind::Audio);
    }
}
