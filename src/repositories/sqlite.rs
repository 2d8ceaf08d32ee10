//! `sqlx`-backed implementation of [`PacketStore`] over SQLite.
//!
//! Rows are mapped by hand rather than via `#[derive(FromRow)]` so that
//! `Packet::id` (a `Uuid`) round-trips through SQLite's `TEXT` affinity
//! explicitly, instead of depending on sqlx's native-UUID column mapping.
//!
//! Every method that issues more than one statement (`insert_packet`'s
//! existence-check-then-insert, `delete_packet`/`delete_all`'s
//! votes-then-packets deletes, `set_finish_times`' per-packet updates) runs
//! inside a single `sqlx::Transaction` so a failure partway through never
//! leaves partial state committed — an uncommitted `tx` rolls back on drop.

use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use super::traits::{NewPacket, PacketOrder, PacketStore, RepositoryResult};
use crate::errors::RepositoryError;
use crate::models::{Packet, Song, Vote};

pub struct SqlitePacketStore {
    pool: Pool<Sqlite>,
}

impl SqlitePacketStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn row_to_packet(row: &sqlx::sqlite::SqliteRow) -> Result<Packet, sqlx::Error> {
        let id: String = row.try_get("id")?;
        Ok(Packet {
            id: Uuid::parse_str(&id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            sequence: row.try_get("sequence")?,
            player_name: row.try_get("player_name")?,
            song_id: row.try_get("song_id")?,
            video_url: row.try_get("video_url")?,
            video_title: row.try_get("video_title")?,
            video_length: row.try_get("video_length")?,
            user: row.try_get("user")?,
            arrival_time: row.try_get("arrival_time")?,
            finish_time: row.try_get("finish_time")?,
        })
    }

    fn order_column(order_by: PacketOrder) -> &'static str {
        match order_by {
            PacketOrder::ArrivalTime => "arrival_time",
            PacketOrder::FinishTime => "finish_time",
        }
    }

    fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(
            err,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation()
        )
    }
}

#[async_trait]
impl PacketStore for SqlitePacketStore {
    async fn find_packet_by_song(
        &self,
        player_name: &str,
        song_id: i64,
    ) -> RepositoryResult<Option<Packet>> {
        let row = sqlx::query(
            "SELECT rowid AS sequence, id, player_name, song_id, video_url, video_title, video_length, user, arrival_time, finish_time \
             FROM packets WHERE player_name = ? AND song_id = ?",
        )
        .bind(player_name)
        .bind(song_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(Self::row_to_packet)
            .transpose()
            .map_err(RepositoryError::from)
    }

    async fn find_packet_by_video(
        &self,
        player_name: &str,
        video_url: &str,
    ) -> RepositoryResult<Option<Packet>> {
        let row = sqlx::query(
            "SELECT rowid AS sequence, id, player_name, song_id, video_url, video_title, video_length, user, arrival_time, finish_time \
             FROM packets WHERE player_name = ? AND video_url = ?",
        )
        .bind(player_name)
        .bind(video_url)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(Self::row_to_packet)
            .transpose()
            .map_err(RepositoryError::from)
    }

    async fn find_packet(&self, id: Uuid) -> RepositoryResult<Option<Packet>> {
        let row = sqlx::query(
            "SELECT rowid AS sequence, id, player_name, song_id, video_url, video_title, video_length, user, arrival_time, finish_time \
             FROM packets WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(Self::row_to_packet)
            .transpose()
            .map_err(RepositoryError::from)
    }

    async fn insert_packet(&self, new: NewPacket) -> RepositoryResult<Packet> {
        // The existence check and the insert must succeed or fail together:
        // a reader mid-transaction should never see a packet referencing a
        // song that turned out not to exist.
        let mut tx = self.pool.begin().await?;

        if let Some(song_id) = new.song_id {
            let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM songs WHERE id = ?")
                .bind(song_id)
                .fetch_one(&mut *tx)
                .await?;
            if exists == 0 {
                return Err(RepositoryError::record_not_found(
                    "songs",
                    "id",
                    song_id.to_string(),
                ));
            }
        }

        let id = Uuid::new_v4();
        let result = sqlx::query(
            "INSERT INTO packets (id, player_name, song_id, video_url, video_title, video_length, user, arrival_time, finish_time) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&new.player_name)
        .bind(new.song_id)
        .bind(&new.video_url)
        .bind(&new.video_title)
        .bind(new.video_length)
        .bind(&new.user)
        .bind(new.arrival_time)
        .bind(new.arrival_time)
        .execute(&mut *tx)
        .await;

        if let Err(err) = &result {
            if Self::is_unique_violation(err) {
                return Err(RepositoryError::constraint_violation(
                    "packets_player_song_or_video",
                    "a packet for this song/video is already queued",
                ));
            }
        }
        let sequence = result?.last_insert_rowid();
        tx.commit().await?;

        Ok(Packet {
            id,
            sequence,
            player_name: new.player_name,
            song_id: new.song_id,
            video_url: new.video_url,
            video_title: new.video_title,
            video_length: new.video_length,
            user: new.user,
            arrival_time: new.arrival_time,
            finish_time: new.arrival_time,
        })
    }

    async fn delete_packet(&self, id: Uuid) -> RepositoryResult<()> {
        // Both deletes commit together, or neither does — a crash between
        // them must never leave an orphaned vote row behind.
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM votes WHERE packet_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM packets WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_all(&self, player_name: &str) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "DELETE FROM votes WHERE packet_id IN (SELECT id FROM packets WHERE player_name = ?)",
        )
        .bind(player_name)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM packets WHERE player_name = ?")
            .bind(player_name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_packets(
        &self,
        player_name: &str,
        order_by: PacketOrder,
    ) -> RepositoryResult<Vec<Packet>> {
        let sql = format!(
            "SELECT rowid AS sequence, id, player_name, song_id, video_url, video_title, video_length, user, arrival_time, finish_time \
             FROM packets WHERE player_name = ? ORDER BY {}, sequence",
            Self::order_column(order_by)
        );
        let rows = sqlx::query(&sql)
            .bind(player_name)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(Self::row_to_packet)
            .collect::<Result<Vec<_>, _>>()
            .map_err(RepositoryError::from)
    }

    async fn list_packets_of_user(
        &self,
        player_name: &str,
        user: &str,
        order_by: PacketOrder,
    ) -> RepositoryResult<Vec<Packet>> {
        let sql = format!(
            "SELECT rowid AS sequence, id, player_name, song_id, video_url, video_title, video_length, user, arrival_time, finish_time \
             FROM packets WHERE player_name = ? AND user = ? ORDER BY {}, sequence",
            Self::order_column(order_by)
        );
        let rows = sqlx::query(&sql)
            .bind(player_name)
            .bind(user)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(Self::row_to_packet)
            .collect::<Result<Vec<_>, _>>()
            .map_err(RepositoryError::from)
    }

    async fn set_finish_times(&self, updates: &[(Uuid, f64)]) -> RepositoryResult<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for (packet_id, finish_time) in updates {
            sqlx::query("UPDATE packets SET finish_time = ? WHERE id = ?")
                .bind(finish_time)
                .bind(packet_id.to_string())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn append_vote(&self, packet_id: Uuid, user: &str) -> RepositoryResult<()> {
        let result = sqlx::query("INSERT INTO votes (packet_id, user) VALUES (?, ?)")
            .bind(packet_id.to_string())
            .bind(user)
            .execute(&self.pool)
            .await;

        if let Err(err) = &result {
            if Self::is_unique_violation(err) {
                return Err(RepositoryError::constraint_violation(
                    "votes_packet_user",
                    format!("user {user} already voted for this packet"),
                ));
            }
        }
        result?;
        Ok(())
    }

    async fn votes_for_packet(&self, packet_id: Uuid) -> RepositoryResult<Vec<Vote>> {
        let rows = sqlx::query("SELECT packet_id, user FROM votes WHERE packet_id = ?")
            .bind(packet_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let packet_id: String = row.try_get("packet_id")?;
                Ok(Vote {
                    packet_id: Uuid::parse_str(&packet_id)
                        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
                    user: row.try_get("user")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(RepositoryError::from)
    }

    async fn count_distinct_users(&self, player_name: &str) -> RepositoryResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT user) FROM packets WHERE player_name = ?",
        )
        .bind(player_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn count_packets(&self, player_name: &str) -> RepositoryResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM packets WHERE player_name = ?")
            .bind(player_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn max_arrival_time(&self, player_name: &str) -> RepositoryResult<Option<f64>> {
        let max: Option<f64> =
            sqlx::query_scalar("SELECT MAX(arrival_time) FROM packets WHERE player_name = ?")
                .bind(player_name)
                .fetch_one(&self.pool)
                .await?;
        Ok(max)
    }

    async fn song_by_id(&self, id: i64) -> RepositoryResult<Option<Song>> {
        let row = sqlx::query_as::<_, Song>("SELECT id, path, length FROM songs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn song_paths(&self) -> RepositoryResult<Vec<String>> {
        let paths: Vec<String> = sqlx::query_scalar("SELECT path FROM songs")
            .fetch_all(&self.pool)
            .await?;
        Ok(paths)
    }

    async fn song_count(&self) -> RepositoryResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn random_song(&self, exclude_paths: &[String]) -> RepositoryResult<Option<Song>> {
        let row = if exclude_paths.is_empty() {
            sqlx::query_as::<_, Song>(
                "SELECT id, path, length FROM songs ORDER BY RANDOM() LIMIT 1",
            )
            .fetch_optional(&self.pool)
            .await?
        } else {
            let placeholders = std::iter::repeat("?")
                .take(exclude_paths.len())
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT id, path, length FROM songs WHERE path NOT IN ({placeholders}) ORDER BY RANDOM() LIMIT 1"
            );
            let mut query = sqlx::query_as::<_, Song>(&sql);
            for path in exclude_paths {
                query = query.bind(path);
            }
            query.fetch_optional(&self.pool).await?
        };
        Ok(row)
    }

    async fn append_history(
        &self,
        song_id: i64,
        user: &str,
        player_name: &str,
    ) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO play_history (song_id, user, player_name, played_at) VALUES (?, ?, ?, ?)",
        )
        .bind(song_id)
        .bind(user)
        .bind(player_name)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
