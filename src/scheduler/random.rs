//! The non-repeating random-fallback selector (§4.4), composed of
//! [`super::discard_pile::DiscardPile`] and whatever the library currently
//! contains according to the [`crate::repositories::PacketStore`].

use std::collections::HashSet;

use crate::errors::RepositoryError;
use crate::models::Song;
use crate::repositories::PacketStore;

use super::discard_pile::DiscardPile;

pub struct RandomSelector<'a> {
    store: &'a dyn PacketStore,
    dont_repeat_for: f64,
    max_dont_repeat_for: Option<u64>,
}

impl<'a> RandomSelector<'a> {
    pub fn new(store: &'a dyn PacketStore, dont_repeat_for: f64, max_dont_repeat_for: Option<u64>) -> Self {
        Self {
            store,
            dont_repeat_for,
            max_dont_repeat_for,
        }
    }

    /// Selects a Local song per §4.4. Mutates `pile` (purging vanished
    /// entries, then — on a successful caller-driven `advance` — the caller
    /// appends the chosen path separately via [`DiscardPile::push`], since
    /// whether a pick "counts" depends on it actually being played).
    pub async fn select(&self, pile: &mut DiscardPile) -> Result<Option<Song>, RepositoryError> {
        if self.dont_repeat_for == 0.0 || self.max_dont_repeat_for == Some(0) {
            return self.store.random_song(&[]).await;
        }

        let library_size = self.store.song_count().await?;
        let capacity =
            DiscardPile::compute_capacity(library_size, self.dont_repeat_for, self.max_dont_repeat_for);

        if capacity == 0 {
            pile.clear();
            return self.store.random_song(&[]).await;
        }

        let existing_paths: HashSet<String> = self.store.song_paths().await?.into_iter().collect();
        pile.purge_missing(&existing_paths);
        pile.trim_to(capacity);

        let excluded: Vec<String> = pile.paths().cloned().collect();
        self.store.random_song(&excluded).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryPacketStore;

    #[tokio::test]
    async fn falls_back_to_uniform_pick_when_disabled() {
        let store = InMemoryPacketStore::new();
        store.seed_song("a.mp3", 10.0).await;
        store.seed_song("b.mp3", 10.0).await;

        let selector = RandomSelector::new(&store, 0.0, None);
        let mut pile = DiscardPile::new();
        let picked = selector.select(&mut pile).await.unwrap();
        assert!(picked.is_some());
    }

    #[tokio::test]
    async fn excludes_paths_already_in_the_discard_pile() {
        let store = InMemoryPacketStore::new();
        store.seed_song("a.mp3", 10.0).await;
        store.seed_song("b.mp3", 10.0).await;

        let selector = RandomSelector::new(&store, 1.0, None);
        let mut pile = DiscardPile::new();
        pile.push("a.mp3".to_string(), 10);

        for _ in 0..20 {
            let picked = selector.select(&mut pile).await.unwrap().unwrap();
            assert_eq!(picked.path, "b.mp3");
        }
    }

    #[tokio::test]
    async fn zero_capacity_clears_pile_and_selects_uniformly() {
        let store = InMemoryPacketStore::new();
        store.seed_song("a.mp3", 10.0).await;

        // dont_repeat_for > 0 but max cap is 0: pile is disabled.
        let selector = RandomSelector::new(&store, 0.5, Some(0));
        let mut pile = DiscardPile::new();
        pile.push("a.mp3".to_string(), 10);

        let picked = selector.select(&mut pile).await.unwrap();
        assert!(picked.is_some());
        assert!(pile.is_empty());
    }
}
