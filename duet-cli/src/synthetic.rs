use async_trait::async_trait;
use duet_client::{LocalMedia, LocalTrack, MediaConstraints, MediaError, MediaSource, TrackKind};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Capture stand-in for headless runs: hands out tracks with no device behind them.
#[derive(Debug, Default)]
pub struct SyntheticMediaSource {
    next_id: AtomicU64,
}

#[async_trait]
impl MediaSource for SyntheticMediaSource {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalMedia, MediaError> {
        if !constraints.audio && constraints.video.is_none() {
            return Err(MediaError::Unavailable("no track requested".to_owned()));
        }

        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(LocalTrack {
                id: format!("synthetic-audio-{n}"),
                kind: TrackKind::Audio,
                source: None,
                enabled: true,
            });
        }
        if let Some(source) = constraints.video {
            tracks.push(LocalTrack {
                id: format!("synthetic-video-{n}"),
                kind: TrackKind::Video,
                source: Some(source),
                enabled: true,
            });
        }
        Ok(LocalMedia { tracks })
    }

    async fn release(&self, track: &LocalTrack) {
        debug!("Released synthetic {} track {}", track.kind, track.id);
    }
}
