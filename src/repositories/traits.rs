use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::RepositoryError;
use crate::models::{Packet, Song, Vote};

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Ordering key for [`PacketStore::list_packets`] / `list_packets_of_user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOrder {
    ArrivalTime,
    FinishTime,
}

/// Fields required to enqueue a new packet. `arrival_time` is stamped by the
/// scheduler from the current virtual time before insertion.
#[derive(Debug, Clone)]
pub struct NewPacket {
    pub player_name: String,
    pub song_id: Option<i64>,
    pub video_url: Option<String>,
    pub video_title: Option<String>,
    pub video_length: Option<f64>,
    pub user: String,
    pub arrival_time: f64,
}

/// Transactional CRUD over packets, votes, songs and play history, scoped to
/// one player. This is the specification's "PacketStore (interface)"
/// collaborator — everything the scheduler needs from persistence, and
/// nothing it doesn't.
///
/// Implementations must enforce: `(player_name, song_id)` unique when Local,
/// `(player_name, video_url)` unique when Remote, and at most one `Vote` per
/// `(packet, user)` with no vote by the packet's own owner.
#[async_trait]
pub trait PacketStore: Send + Sync {
    async fn find_packet_by_song(
        &self,
        player_name: &str,
        song_id: i64,
    ) -> RepositoryResult<Option<Packet>>;

    async fn find_packet_by_video(
        &self,
        player_name: &str,
        video_url: &str,
    ) -> RepositoryResult<Option<Packet>>;

    async fn find_packet(&self, id: Uuid) -> RepositoryResult<Option<Packet>>;

    /// Insert a new packet. Returns `ConstraintViolation` if the
    /// `(player_name, song_id)`/`(player_name, video_url)` uniqueness is
    /// violated, or `RecordNotFound` if `song_id` references a nonexistent
    /// song (the §4.3.1 `NotFound` path).
    async fn insert_packet(&self, new: NewPacket) -> RepositoryResult<Packet>;

    /// Deletes the packet and cascades its votes. A no-op (not an error) if
    /// the packet is already absent — `advance`'s idempotency (§9) depends
    /// on this.
    async fn delete_packet(&self, id: Uuid) -> RepositoryResult<()>;

    async fn delete_all(&self, player_name: &str) -> RepositoryResult<()>;

    async fn list_packets(
        &self,
        player_name: &str,
        order_by: PacketOrder,
    ) -> RepositoryResult<Vec<Packet>>;

    async fn list_packets_of_user(
        &self,
        player_name: &str,
        user: &str,
        order_by: PacketOrder,
    ) -> RepositoryResult<Vec<Packet>>;

    /// Writes back finish times for a batch of packets — the result of one
    /// `finish_time::recompute` call over a single user's packets — as a
    /// single atomic operation, so a failure partway through a recompute
    /// can't leave some of that user's packets with a stale `finish_time`.
    async fn set_finish_times(&self, updates: &[(Uuid, f64)]) -> RepositoryResult<()>;

    /// Appends a vote `(packet_id, user)`. Returns `ConstraintViolation` if
    /// the user already has a vote on this packet (callers translate this
    /// into `SchedulerError::AlreadyVoted`).
    async fn append_vote(&self, packet_id: Uuid, user: &str) -> RepositoryResult<()>;

    async fn votes_for_packet(&self, packet_id: Uuid) -> RepositoryResult<Vec<Vote>>;

    async fn count_distinct_users(&self, player_name: &str) -> RepositoryResult<u64>;

    /// Raw packet count for `player_name`, independent of scheduler state.
    /// Matches `Scheduler.num_songs_queued` in the original implementation.
    async fn count_packets(&self, player_name: &str) -> RepositoryResult<u64>;

    async fn max_arrival_time(&self, player_name: &str) -> RepositoryResult<Option<f64>>;

    async fn song_by_id(&self, id: i64) -> RepositoryResult<Option<Song>>;

    async fn song_paths(&self) -> RepositoryResult<Vec<String>>;

    /// Library size, used to compute the discard pile capacity `M`.
    async fn song_count(&self) -> RepositoryResult<u64>;

    /// Draw one song uniformly at random, excluding the given paths.
    /// Returns `None` if no song matches (spec §4.4 step 3).
    async fn random_song(&self, exclude_paths: &[String]) -> RepositoryResult<Option<Song>>;

    async fn append_history(
        &self,
        song_id: i64,
        user: &str,
        player_name: &str,
    ) -> RepositoryResult<()>;
}
