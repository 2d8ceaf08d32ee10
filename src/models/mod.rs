//! Data model for the jukebox scheduler: packets, votes, songs and the
//! derived views handed to callers.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One enqueued item for one owning user.
///
/// Exactly one of `song_id` or `video_url` is populated, matching the
/// `Local | Remote` discriminated kind in the spec. `finish_time` is derived
/// by [`crate::scheduler::finish_time::recompute`] and is not meaningful
/// until that has run at least once for the packet's owner.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Packet {
    pub id: Uuid,
    /// Monotonic insertion order, used as the final tie-break when two
    /// packets share an `arrival_time` (ties are common: nothing advances
    /// `V` between votes issued in the same tick). A random `Uuid` can't
    /// serve this role, so the store assigns this separately from `id`.
    pub sequence: i64,
    pub player_name: String,
    pub song_id: Option<i64>,
    pub video_url: Option<String>,
    pub video_title: Option<String>,
    pub video_length: Option<f64>,
    pub user: String,
    pub arrival_time: f64,
    pub finish_time: f64,
}

impl Packet {
    pub fn is_remote(&self) -> bool {
        self.video_url.is_some()
    }

    /// The key this packet is uniquely identified by within its kind:
    /// `song_id` for Local, `video_url` for Remote.
    pub fn key(&self) -> PacketKey {
        match &self.video_url {
            Some(url) => PacketKey::Remote(url.clone()),
            None => PacketKey::Local(self.song_id.expect("local packet must carry a song_id")),
        }
    }
}

/// Identifies a packet by its discriminated kind and key, independent of
/// its surrogate id. Used to match the player's `now_playing` against the
/// pending queue (spec §4.3.5 / §9 open question: matching is by
/// `(kind, key)`, not object identity).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PacketKey {
    Local(i64),
    Remote(String),
}

/// An additional vote by a user other than the packet's owner.
///
/// Uniqueness on `(packet_id, user)` and the invariant that the owner never
/// appears here are enforced by the backing [`crate::repositories::PacketStore`].
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Vote {
    pub packet_id: Uuid,
    pub user: String,
}

/// `weight(packet) = 1 + additional_votes`. Minimum 1.
pub fn weight(additional_votes: usize) -> f64 {
    (1 + additional_votes) as f64
}

/// A library track. External to the scheduler's own write path except for
/// the `random_song`/`song_by_id` reads it performs through the store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Song {
    pub id: i64,
    pub path: String,
    pub length: f64,
}

/// One row of play history, appended whenever a Local song is actually
/// handed to the player (spec §4.3.4 step 3).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlayHistory {
    pub id: i64,
    pub song_id: i64,
    pub user: String,
    pub player_name: String,
    pub played_at: chrono::DateTime<chrono::Utc>,
}

/// The tagged variant the player interface actually deals with, replacing
/// the dynamic polymorphism between `Song` and `YouTubeVideo` in the
/// original implementation (spec §9 redesign cue).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayItem {
    Local { song_id: i64, path: String },
    Remote { url: String, title: String, length: f64 },
}

impl PlayItem {
    pub fn length(&self) -> f64 {
        match self {
            PlayItem::Local { .. } => 0.0, // caller resolves Local length via the Song record
            PlayItem::Remote { length, .. } => *length,
        }
    }

    pub fn key(&self) -> PacketKey {
        match self {
            PlayItem::Local { song_id, .. } => PacketKey::Local(*song_id),
            PlayItem::Remote { url, .. } => PacketKey::Remote(url.clone()),
        }
    }
}

/// One packet, annotated for display, as returned by
/// [`crate::scheduler::Scheduler::queue`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueEntry {
    pub packet_id: Uuid,
    pub item: PlayItem,
    pub owner: String,
    pub num_votes: usize,
    pub has_voted: bool,
    pub arrival_time: f64,
    pub finish_time: f64,
}

/// Reserved pseudo-user under which `advance` synthesizes a vote when the
/// queue is empty and a random Local song is drawn.
pub const RANDOM_USER: &str = "RANDOM";
