//! The media player collaborator: an opaque device that plays one item at a
//! time and signals when it has ended. Out of scope per the specification
//! ("the media player... referenced only by interface"); this module
//! defines the interface plus a no-op implementation suitable as a default
//! and for tests.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::models::PlayItem;

/// Handed to the actual playback device; implementations out of scope here.
#[async_trait]
pub trait Player: Send + Sync {
    async fn play(&self, item: PlayItem);
    async fn stop(&self);
    async fn has_ended(&self) -> bool;
    async fn now_playing(&self) -> Option<PlayItem>;
}

/// A `Player` that tracks `now_playing` in memory and never signals
/// completion on its own — tests and the standalone binary drive it
/// explicitly via [`NullPlayer::mark_ended`].
pub struct NullPlayer {
    state: Mutex<State>,
}

struct State {
    now_playing: Option<PlayItem>,
    ended: bool,
}

impl NullPlayer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                now_playing: None,
                ended: false,
            }),
        }
    }

    /// Simulates the device reaching the end of the current item, so the
    /// next `Ticker` tick triggers `advance`.
    pub async fn mark_ended(&self) {
        self.state.lock().await.ended = true;
    }
}

impl Default for NullPlayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Player for NullPlayer {
    async fn play(&self, item: PlayItem) {
        let mut state = self.state.lock().await;
        state.now_playing = Some(item);
        state.ended = false;
    }

    async fn stop(&self) {
        let mut state = self.state.lock().await;
        state.now_playing = None;
        state.ended = false;
    }

    async fn has_ended(&self) -> bool {
        self.state.lock().await.ended
    }

    async fn now_playing(&self) -> Option<PlayItem> {
        self.state.lock().await.now_playing.clone()
    }
}
