//! In-memory [`PacketStore`] used by unit and integration tests.
//!
//! Per the specification's re-architecture cue, this enforces the exact
//! same uniqueness constraints the SQL schema does: it is not a relaxed
//! stand-in, just a different backing.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::traits::{NewPacket, PacketOrder, PacketStore, RepositoryResult};
use crate::errors::RepositoryError;
use crate::models::{Packet, Song, Vote};

#[derive(Default)]
struct State {
    packets: HashMap<Uuid, Packet>,
    votes: HashMap<Uuid, Vec<String>>,
    songs: HashMap<i64, Song>,
    history: Vec<(i64, String, String)>,
    next_song_id: i64,
    next_sequence: i64,
}

pub struct InMemoryPacketStore {
    state: Mutex<State>,
}

impl InMemoryPacketStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_song_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Seed a song into the library, returning its assigned id.
    pub async fn seed_song(&self, path: impl Into<String>, length: f64) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_song_id;
        state.next_song_id += 1;
        state.songs.insert(
            id,
            Song {
                id,
                path: path.into(),
                length,
            },
        );
        id
    }

    pub async fn remove_song(&self, id: i64) {
        let mut state = self.state.lock().await;
        state.songs.remove(&id);
    }
}

impl Default for InMemoryPacketStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_packets(mut packets: Vec<Packet>, order_by: PacketOrder) -> Vec<Packet> {
    packets.sort_by(|a, b| {
        let primary = match order_by {
            PacketOrder::ArrivalTime => a.arrival_time.total_cmp(&b.arrival_time),
            PacketOrder::FinishTime => a.finish_time.total_cmp(&b.finish_time),
        };
        primary.then_with(|| a.sequence.cmp(&b.sequence))
    });
    packets
}

#[async_trait]
impl PacketStore for InMemoryPacketStore {
    async fn find_packet_by_song(
        &self,
        player_name: &str,
        song_id: i64,
    ) -> RepositoryResult<Option<Packet>> {
        let state = self.state.lock().await;
        Ok(state
            .packets
            .values()
            .find(|p| p.player_name == player_name && p.song_id == Some(song_id))
            .cloned())
    }

    async fn find_packet_by_video(
        &self,
        player_name: &str,
        video_url: &str,
    ) -> RepositoryResult<Option<Packet>> {
        let state = self.state.lock().await;
        Ok(state
            .packets
            .values()
            .find(|p| p.player_name == player_name && p.video_url.as_deref() == Some(video_url))
            .cloned())
    }

    async fn find_packet(&self, id: Uuid) -> RepositoryResult<Option<Packet>> {
        let state = self.state.lock().await;
        Ok(state.packets.get(&id).cloned())
    }

    async fn insert_packet(&self, new: NewPacket) -> RepositoryResult<Packet> {
        let mut state = self.state.lock().await;

        if let Some(song_id) = new.song_id {
            if !state.songs.contains_key(&song_id) {
                return Err(RepositoryError::record_not_found(
                    "songs",
                    "id",
                    song_id.to_string(),
                ));
            }
            let clash = state
                .packets
                .values()
                .any(|p| p.player_name == new.player_name && p.song_id == Some(song_id));
            if clash {
                return Err(RepositoryError::constraint_violation(
                    "packets_player_song",
                    "a packet for this song is already queued",
                ));
            }
        }
        if let Some(url) = &new.video_url {
            let clash = state.packets.values().any(|p| {
                p.player_name == new.player_name && p.video_url.as_deref() == Some(url.as_str())
            });
            if clash {
                return Err(RepositoryError::constraint_violation(
                    "packets_player_video",
                    "a packet for this video is already queued",
                ));
            }
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;

        let packet = Packet {
            id: Uuid::new_v4(),
            sequence,
            player_name: new.player_name,
            song_id: new.song_id,
            video_url: new.video_url,
            video_title: new.video_title,
            video_length: new.video_length,
            user: new.user,
            arrival_time: new.arrival_time,
            finish_time: new.arrival_time,
        };
        state.packets.insert(packet.id, packet.clone());
        Ok(packet)
    }

    async fn delete_packet(&self, id: Uuid) -> RepositoryResult<()> {
        let mut state = self.state.lock().await;
        state.packets.remove(&id);
        state.votes.remove(&id);
        Ok(())
    }

    async fn delete_all(&self, player_name: &str) -> RepositoryResult<()> {
        let mut state = self.state.lock().await;
        let ids: Vec<Uuid> = state
            .packets
            .values()
            .filter(|p| p.player_name == player_name)
            .map(|p| p.id)
            .collect();
        for id in ids {
            state.packets.remove(&id);
            state.votes.remove(&id);
        }
        Ok(())
    }

    async fn list_packets(
        &self,
        player_name: &str,
        order_by: PacketOrder,
    ) -> RepositoryResult<Vec<Packet>> {
        let state = self.state.lock().await;
        let packets: Vec<Packet> = state
            .packets
            .values()
            .filter(|p| p.player_name == player_name)
            .cloned()
            .collect();
        Ok(sort_packets(packets, order_by))
    }

    async fn list_packets_of_user(
        &self,
        player_name: &str,
        user: &str,
        order_by: PacketOrder,
    ) -> RepositoryResult<Vec<Packet>> {
        let state = self.state.lock().await;
        let packets: Vec<Packet> = state
            .packets
            .values()
            .filter(|p| p.player_name == player_name && p.user == user)
            .cloned()
            .collect();
        Ok(sort_packets(packets, order_by))
    }

    async fn set_finish_times(&self, updates: &[(Uuid, f64)]) -> RepositoryResult<()> {
        let mut state = self.state.lock().await;
        for (packet_id, finish_time) in updates {
            if let Some(packet) = state.packets.get_mut(packet_id) {
                packet.finish_time = *finish_time;
            }
        }
        Ok(())
    }

    async fn append_vote(&self, packet_id: Uuid, user: &str) -> RepositoryResult<()> {
        let mut state = self.state.lock().await;
        let votes = state.votes.entry(packet_id).or_default();
        if votes.iter().any(|u| u == user) {
            return Err(RepositoryError::constraint_violation(
                "votes_packet_user",
                format!("user {user} already voted for this packet"),
            ));
        }
        votes.push(user.to_string());
        Ok(())
    }

    async fn votes_for_packet(&self, packet_id: Uuid) -> RepositoryResult<Vec<Vote>> {
        let state = self.state.lock().await;
        Ok(state
            .votes
            .get(&packet_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|user| Vote { packet_id, user })
            .collect())
    }

    async fn count_distinct_users(&self, player_name: &str) -> RepositoryResult<u64> {
        let state = self.state.lock().await;
        let mut users: Vec<&str> = state
            .packets
            .values()
            .filter(|p| p.player_name == player_name)
            .map(|p| p.user.as_str())
            .collect();
        users.sort_unstable();
        users.dedup();
        Ok(users.len() as u64)
    }

    async fn count_packets(&self, player_name: &str) -> RepositoryResult<u64> {
        let state = self.state.lock().await;
        Ok(state
            .packets
            .values()
            .filter(|p| p.player_name == player_name)
            .count() as u64)
    }

    async fn max_arrival_time(&self, player_name: &str) -> RepositoryResult<Option<f64>> {
        let state = self.state.lock().await;
        Ok(state
            .packets
            .values()
            .filter(|p| p.player_name == player_name)
            .map(|p| p.arrival_time)
            .fold(None, |acc, t| match acc {
                Some(max) if max >= t => Some(max),
                _ => Some(t),
            }))
    }

    async fn song_by_id(&self, id: i64) -> RepositoryResult<Option<Song>> {
        let state = self.state.lock().await;
        Ok(state.songs.get(&id).cloned())
    }

    async fn song_paths(&self) -> RepositoryResult<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state.songs.values().map(|s| s.path.clone()).collect())
    }

    async fn song_count(&self) -> RepositoryResult<u64> {
        let state = self.state.lock().await;
        Ok(state.songs.len() as u64)
    }

    async fn random_song(&self, exclude_paths: &[String]) -> RepositoryResult<Option<Song>> {
        let state = self.state.lock().await;
        let candidates: Vec<&Song> = state
            .songs
            .values()
            .filter(|s| !exclude_paths.iter().any(|p| p == &s.path))
            .collect();
        if candidates.is_empty() {
            return Ok(None);
        }
        let pick = fastrand::usize(..candidates.len());
        Ok(Some(candidates[pick].clone()))
    }

    async fn append_history(
        &self,
        song_id: i64,
        user: &str,
        player_name: &str,
    ) -> RepositoryResult<()> {
        let mut state = self.state.lock().await;
        state
            .history
            .push((song_id, user.to_string(), player_name.to_string()));
        Ok(())
    }
}
