use async_trait::async_trait;
use duet_client::{LocalMedia, LocalTrack, MediaConstraints, MediaError, MediaSource, TrackKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Capture devices that hand out numbered tracks and remember what was released.
#[derive(Clone)]
pub struct MockMediaSource {
    deny: bool,
    delay: Duration,
    acquisitions: Arc<AtomicUsize>,
    released: Arc<Mutex<Vec<String>>>,
}

impl MockMediaSource {
    pub fn new() -> Self {
        Self {
            deny: false,
            delay: Duration::ZERO,
            acquisitions: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every acquisition fails as if the user dismissed the permission prompt.
    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::new()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub async fn released(&self) -> Vec<String> {
        self.released.lock().await.clone()
    }

    /// Poll until the track with `id` has been released.
    pub async fn wait_for_release(&self, id: &str) -> bool {
        for _ in 0..400 {
            if self.released.lock().await.iter().any(|released| released == id) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }
}

#[async_trait]
impl MediaSource for MockMediaSource {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalMedia, MediaError> {
        let n = self.acquisitions.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.deny {
            return Err(MediaError::AccessDenied("permission dismissed".to_owned()));
        }

        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(LocalTrack {
                id: format!("audio-{n}"),
                kind: TrackKind::Audio,
                source: None,
                enabled: true,
            });
        }
        if let Some(source) = constraints.video {
            tracks.push(LocalTrack {
                id: format!("video-{n}"),
                kind: TrackKind::Video,
                source: Some(source),
                enabled: true,
            });
        }
        Ok(LocalMedia { tracks })
    }

    async fn release(&self, track: &LocalTrack) {
        tracing::debug!("[MockMedia] released {}", track.id);
        self.released.lock().await.push(track.id.clone());
    }
}
