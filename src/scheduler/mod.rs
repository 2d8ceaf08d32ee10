//! The Scheduler: orchestrates `vote`, `remove`, `clear`, `advance` and
//! `queue`, owning the Clock, DiscardPile and active-session count (§4.3).
//!
//! All mutating operations serialize on a single [`tokio::sync::Mutex`]
//! covering `{clock, discard_pile, active_sessions}`, per §5 — this is the
//! same "hold one lock across the whole operation, including the store
//! calls" shape the teacher uses for `Database::acquire_channel_update_lock`.

pub mod clock;
pub mod discard_pile;
pub mod finish_time;
pub mod random;
pub mod ticker;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::errors::{RepositoryError, SchedulerError};
use crate::models::{weight, Packet, PacketKey, PlayItem, QueueEntry, RANDOM_USER};
use crate::player::Player;
use crate::remote::{is_supported_host, RemoteFetcher, RemoteVideoDetails};
use crate::repositories::{NewPacket, PacketOrder, PacketStore};

use clock::Clock;
use discard_pile::DiscardPile;
use finish_time::PacketTiming;
use random::RandomSelector;

pub use ticker::Ticker;

struct SchedulerState {
    clock: Clock,
    discard_pile: DiscardPile,
    active_sessions: u64,
}

pub struct Scheduler {
    store: Arc<dyn PacketStore>,
    player: Arc<dyn Player>,
    fetcher: Arc<dyn RemoteFetcher>,
    player_name: String,
    allowed_hosts: Vec<String>,
    dont_repeat_for: f64,
    max_dont_repeat_for: Option<u64>,
    state: Mutex<SchedulerState>,
}

impl Scheduler {
    pub async fn new(
        store: Arc<dyn PacketStore>,
        player: Arc<dyn Player>,
        fetcher: Arc<dyn RemoteFetcher>,
        player_name: String,
        allowed_hosts: Vec<String>,
        dont_repeat_for: f64,
        max_dont_repeat_for: Option<u64>,
    ) -> Result<Self, SchedulerError> {
        let max_arrival = store.max_arrival_time(&player_name).await?;
        let active_sessions = store.count_distinct_users(&player_name).await?;

        let scheduler = Self {
            store,
            player,
            fetcher,
            player_name,
            allowed_hosts,
            dont_repeat_for,
            max_dont_repeat_for,
            state: Mutex::new(SchedulerState {
                clock: Clock::initialize(max_arrival),
                discard_pile: DiscardPile::new(),
                active_sessions,
            }),
        };

        // Full queue loaded at startup recomputes finish times for everyone
        // (spec §4.2 "When invoked").
        scheduler.recompute_all().await?;

        Ok(scheduler)
    }

    /// Launches the [`Ticker`] as a background task. Matches the
    /// `Scheduler surface (exposed)` requirement in §6.
    pub fn start(
        self: Arc<Self>,
        tick_interval: std::time::Duration,
        stop: Option<tokio::sync::watch::Receiver<bool>>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            Ticker::new(self, tick_interval, stop).run().await;
        })
    }

    // ---- §4.3.1 vote ----------------------------------------------------

    pub async fn vote(
        &self,
        user: &str,
        song_id: Option<i64>,
        video_url: Option<String>,
    ) -> Result<Vec<QueueEntry>, SchedulerError> {
        match (&song_id, &video_url) {
            (Some(_), None) | (None, Some(_)) => {}
            _ => return Err(SchedulerError::InvalidArgument),
        }

        // Resolve remote metadata before taking the lock (§5 suspension
        // points): the existence check here is best-effort — the
        // authoritative check happens once the lock is held.
        let pre_resolved = if let Some(url) = &video_url {
            if !is_supported_host(url, &self.allowed_hosts) {
                return Err(SchedulerError::UnsupportedSource { url: url.clone() });
            }
            let already_queued = self
                .store
                .find_packet_by_video(&self.player_name, url)
                .await?
                .is_some();
            if already_queued {
                None
            } else {
                Some(self.resolve_remote(url).await?)
            }
        } else {
            None
        };

        let mut state = self.state.lock().await;

        let existing = match &video_url {
            Some(url) => self.store.find_packet_by_video(&self.player_name, url).await?,
            None => {
                self.store
                    .find_packet_by_song(&self.player_name, song_id.unwrap())
                    .await?
            }
        };

        if let Some(packet) = existing {
            if packet.user == user {
                return Err(SchedulerError::AlreadyVoted {
                    user: user.to_string(),
                });
            }
            match self.store.append_vote(packet.id, user).await {
                Ok(()) => {}
                Err(RepositoryError::ConstraintViolation { .. }) => {
                    return Err(SchedulerError::AlreadyVoted {
                        user: user.to_string(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
            self.recompute_for_user(&packet.user).await?;
        } else {
            match &video_url {
                Some(url) => {
                    if !is_supported_host(url, &self.allowed_hosts) {
                        return Err(SchedulerError::UnsupportedSource { url: url.clone() });
                    }
                    let details = match pre_resolved {
                        Some(details) => details,
                        None => self.resolve_remote(url).await?,
                    };
                    self.enqueue_locked(
                        &mut state,
                        user,
                        None,
                        Some(url.clone()),
                        Some(details.title),
                        Some(details.length_seconds),
                    )
                    .await?;
                }
                None => {
                    let song_id = song_id.unwrap();
                    self.enqueue_locked(&mut state, user, Some(song_id), None, None, None)
                        .await?;
                }
            }
        }

        drop(state);
        self.build_queue(None).await
    }

    async fn resolve_remote(&self, url: &str) -> Result<RemoteVideoDetails, SchedulerError> {
        self.fetcher
            .fetch(url)
            .await
            .map_err(|e| SchedulerError::LookupFailed {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    async fn enqueue_locked(
        &self,
        state: &mut SchedulerState,
        user: &str,
        song_id: Option<i64>,
        video_url: Option<String>,
        video_title: Option<String>,
        video_length: Option<f64>,
    ) -> Result<Packet, SchedulerError> {
        let arrival_time = state.clock.now();
        let new = NewPacket {
            player_name: self.player_name.clone(),
            song_id,
            video_url,
            video_title,
            video_length,
            user: user.to_string(),
            arrival_time,
        };

        let packet = match self.store.insert_packet(new).await {
            Ok(packet) => packet,
            Err(RepositoryError::RecordNotFound { value, .. }) => {
                return Err(SchedulerError::NotFound {
                    resource: "song".to_string(),
                    id: value,
                })
            }
            Err(e) => return Err(e.into()),
        };

        self.recompute_for_user(user).await?;
        self.refresh_active_sessions(state).await?;
        Ok(packet)
    }

    // ---- §4.3.2 remove ----------------------------------------------------

    pub async fn remove(&self, key: PacketKey, skip: bool) -> Result<Vec<QueueEntry>, SchedulerError> {
        let mut state = self.state.lock().await;
        let packet = self
            .locate_by_key(&key)
            .await?
            .ok_or_else(|| SchedulerError::NotFound {
                resource: "packet".to_string(),
                id: describe_key(&key),
            })?;
        self.remove_packet_locked(&mut state, &packet, skip).await?;
        drop(state);
        self.build_queue(None).await
    }

    async fn locate_by_key(&self, key: &PacketKey) -> Result<Option<Packet>, SchedulerError> {
        match key {
            PacketKey::Local(song_id) => self
                .store
                .find_packet_by_song(&self.player_name, *song_id)
                .await
                .map_err(Into::into),
            PacketKey::Remote(url) => self
                .store
                .find_packet_by_video(&self.player_name, url)
                .await
                .map_err(Into::into),
        }
    }

    async fn remove_packet_locked(
        &self,
        state: &mut SchedulerState,
        packet: &Packet,
        skip: bool,
    ) -> Result<(), SchedulerError> {
        let now_playing = self.player.now_playing().await;
        let is_current = now_playing.map(|item| item.key()) == Some(packet.key());

        if is_current {
            self.player.stop().await;
            if skip {
                state.clock.jump_to(packet.finish_time);
            }
        }

        self.store.delete_packet(packet.id).await?;
        self.refresh_active_sessions(state).await?;
        Ok(())
    }

    /// Removes the playing packet if the store still has it; a no-op
    /// otherwise. This is the idempotency §9 calls for: `advance` may run
    /// after an out-of-band `remove` already deleted the same packet.
    async fn remove_current_if_present(
        &self,
        state: &mut SchedulerState,
        skip: bool,
    ) -> Result<(), SchedulerError> {
        let Some(now_playing) = self.player.now_playing().await else {
            return Ok(());
        };
        if let Some(packet) = self.locate_by_key(&now_playing.key()).await? {
            self.remove_packet_locked(state, &packet, skip).await?;
        }
        Ok(())
    }

    // ---- §4.3.3 clear ----------------------------------------------------

    pub async fn clear(&self) -> Result<Vec<QueueEntry>, SchedulerError> {
        let mut state = self.state.lock().await;
        self.store.delete_all(&self.player_name).await?;
        self.player.stop().await;
        self.refresh_active_sessions(&mut state).await?;
        drop(state);
        self.build_queue(None).await
    }

    // ---- §4.3.4 advance ----------------------------------------------------

    pub async fn advance(&self, skip: bool) -> Result<Option<PlayItem>, SchedulerError> {
        let mut state = self.state.lock().await;

        if state.active_sessions == 0 {
            let selector = RandomSelector::new(
                self.store.as_ref(),
                self.dont_repeat_for,
                self.max_dont_repeat_for,
            );
            match selector.select(&mut state.discard_pile).await? {
                Some(song) => {
                    self.enqueue_locked(&mut state, RANDOM_USER, Some(song.id), None, None, None)
                        .await?;
                }
                None => return Ok(None),
            }
        }

        if state.active_sessions == 0 {
            return Ok(None);
        }

        self.remove_current_if_present(&mut state, skip).await?;

        let mut packets = self
            .store
            .list_packets(&self.player_name, PacketOrder::FinishTime)
            .await?;
        let Some(next) = (!packets.is_empty()).then(|| packets.remove(0)) else {
            return Ok(None);
        };

        let item = if let Some(url) = &next.video_url {
            PlayItem::Remote {
                url: url.clone(),
                title: next.video_title.clone().unwrap_or_default(),
                length: next.video_length.unwrap_or(0.0),
            }
        } else {
            let song_id = next
                .song_id
                .expect("non-remote packet must carry a song_id");
            let song = self.store.song_by_id(song_id).await?.ok_or_else(|| {
                SchedulerError::NotFound {
                    resource: "song".to_string(),
                    id: song_id.to_string(),
                }
            })?;

            let library_size = self.store.song_count().await?;
            let capacity = DiscardPile::compute_capacity(
                library_size,
                self.dont_repeat_for,
                self.max_dont_repeat_for,
            );
            state.discard_pile.push(song.path.clone(), capacity);

            self.store
                .append_history(song_id, &next.user, &self.player_name)
                .await?;

            PlayItem::Local {
                song_id,
                path: song.path,
            }
        };

        self.player.play(item.clone()).await;
        Ok(Some(item))
    }

    // ---- §4.3.5 queue ----------------------------------------------------

    /// Purely observational — no state change, per the "queue() is
    /// idempotent" law.
    pub async fn queue(&self, viewer: Option<&str>) -> Result<Vec<QueueEntry>, SchedulerError> {
        self.build_queue(viewer).await
    }

    async fn build_queue(&self, viewer: Option<&str>) -> Result<Vec<QueueEntry>, SchedulerError> {
        let packets = self
            .store
            .list_packets(&self.player_name, PacketOrder::FinishTime)
            .await?;

        let mut entries = Vec::with_capacity(packets.len());
        for packet in &packets {
            let votes = self.store.votes_for_packet(packet.id).await?;
            let has_voted = match viewer {
                Some(v) => v == packet.user || votes.iter().any(|vote| vote.user == v),
                None => false,
            };

            let item = if let Some(url) = &packet.video_url {
                PlayItem::Remote {
                    url: url.clone(),
                    title: packet.video_title.clone().unwrap_or_default(),
                    length: packet.video_length.unwrap_or(0.0),
                }
            } else {
                let song_id = packet
                    .song_id
                    .expect("non-remote packet must carry a song_id");
                let path = self
                    .store
                    .song_by_id(song_id)
                    .await?
                    .map(|s| s.path)
                    .unwrap_or_default();
                PlayItem::Local { song_id, path }
            };

            entries.push(QueueEntry {
                packet_id: packet.id,
                item,
                owner: packet.user.clone(),
                num_votes: votes.len() + 1,
                has_voted,
                arrival_time: packet.arrival_time,
                finish_time: packet.finish_time,
            });
        }

        // Rotate so the item the player reports as current comes first,
        // matched by (kind, key) rather than object identity (§9).
        if let Some(now_playing) = self.player.now_playing().await {
            let key = now_playing.key();
            if let Some(pos) = entries.iter().position(|e| e.item.key() == key) {
                entries.rotate_left(pos);
            }
        }

        Ok(entries)
    }

    // ---- §4.3.6 num_queued / empty ----------------------------------------------------

    /// Raw packet count for this player, independent of scheduler state.
    pub async fn num_queued(&self) -> Result<u64, SchedulerError> {
        Ok(self.store.count_packets(&self.player_name).await?)
    }

    pub async fn empty(&self) -> bool {
        self.state.lock().await.active_sessions == 0
    }

    pub async fn now_playing(&self) -> Option<PlayItem> {
        self.player.now_playing().await
    }

    // ---- internals ----------------------------------------------------

    async fn refresh_active_sessions(&self, state: &mut SchedulerState) -> Result<(), SchedulerError> {
        state.active_sessions = self.store.count_distinct_users(&self.player_name).await?;
        Ok(())
    }

    /// Ticker cadence: advances `V` by `tick / active_sessions` — called
    /// without the scheduler's own lock held by the caller (the `Ticker`
    /// acquires it here).
    pub(crate) async fn advance_virtual_time(&self, tick: std::time::Duration) {
        let mut state = self.state.lock().await;
        if state.active_sessions > 0 {
            state
                .clock
                .advance(tick.as_secs_f64() / state.active_sessions as f64);
        }
    }

    async fn recompute_for_user(&self, user: &str) -> Result<(), SchedulerError> {
        let packets = self
            .store
            .list_packets_of_user(&self.player_name, user, PacketOrder::ArrivalTime)
            .await?;
        self.recompute_packets(&packets).await
    }

    async fn recompute_all(&self) -> Result<(), SchedulerError> {
        let packets = self
            .store
            .list_packets(&self.player_name, PacketOrder::ArrivalTime)
            .await?;

        let mut by_user: std::collections::HashMap<String, Vec<Packet>> =
            std::collections::HashMap::new();
        for packet in packets {
            by_user.entry(packet.user.clone()).or_default().push(packet);
        }
        for user_packets in by_user.into_values() {
            self.recompute_packets(&user_packets).await?;
        }
        Ok(())
    }

    async fn recompute_packets(&self, packets: &[Packet]) -> Result<(), SchedulerError> {
        if packets.is_empty() {
            return Ok(());
        }

        let mut timings = Vec::with_capacity(packets.len());
        for packet in packets {
            let length = match packet.video_length {
                Some(length) => length,
                None => {
                    let song_id = packet
                        .song_id
                        .expect("non-remote packet must carry a song_id");
                    self.store
                        .song_by_id(song_id)
                        .await?
                        .ok_or_else(|| SchedulerError::NotFound {
                            resource: "song".to_string(),
                            id: song_id.to_string(),
                        })?
                        .length
                }
            };
            let votes = self.store.votes_for_packet(packet.id).await?;
            timings.push(PacketTiming {
                arrival_time: packet.arrival_time,
                length,
                weight: weight(votes.len()),
                finish_time: 0.0,
            });
        }

        finish_time::recompute(&mut timings);

        let updates: Vec<(uuid::Uuid, f64)> = packets
            .iter()
            .zip(timings.iter())
            .map(|(packet, timing)| (packet.id, timing.finish_time))
            .collect();
        self.store.set_finish_times(&updates).await?;
        Ok(())
    }
}

fn describe_key(key: &PacketKey) -> String {
    match key {
        PacketKey::Local(song_id) => song_id.to_string(),
        PacketKey::Remote(url) => url.clone(),
    }
}
