//! Integration coverage for the scenarios in spec.md's worked-examples
//! section, exercised against `InMemoryPacketStore` + `NullPlayer`.

use std::sync::Arc;

use async_trait::async_trait;

use jukebox_scheduler::errors::SchedulerError;
use jukebox_scheduler::models::{PacketKey, PlayItem};
use jukebox_scheduler::player::NullPlayer;
use jukebox_scheduler::remote::{FetchError, RemoteFetcher, RemoteVideoDetails};
use jukebox_scheduler::repositories::InMemoryPacketStore;
use jukebox_scheduler::scheduler::Scheduler;

struct StubFetcher;

#[async_trait]
impl RemoteFetcher for StubFetcher {
    async fn fetch(&self, video_url: &str) -> Result<RemoteVideoDetails, FetchError> {
        Ok(RemoteVideoDetails {
            title: format!("title for {video_url}"),
            length_seconds: 42.0,
        })
    }
}

async fn build_scheduler(store: Arc<InMemoryPacketStore>) -> Scheduler {
    Scheduler::new(
        store,
        Arc::new(NullPlayer::new()),
        Arc::new(StubFetcher),
        "player-1".to_string(),
        vec!["www.youtube.com".to_string(), "youtu.be".to_string()],
        0.75,
        None,
    )
    .await
    .expect("scheduler construction should succeed")
}

#[tokio::test]
async fn s1_round_robin_fairness_two_users_unit_lengths() {
    let store = Arc::new(InMemoryPacketStore::new());
    let a = store.seed_song("a.mp3", 10.0).await;
    let b = store.seed_song("b.mp3", 10.0).await;
    let c = store.seed_song("c.mp3", 10.0).await;
    let d = store.seed_song("d.mp3", 10.0).await;

    let scheduler = build_scheduler(store).await;

    scheduler.vote("u1", Some(a), None).await.unwrap();
    scheduler.vote("u2", Some(b), None).await.unwrap();
    scheduler.vote("u1", Some(c), None).await.unwrap();
    let queue = scheduler.vote("u2", Some(d), None).await.unwrap();

    let order: Vec<i64> = queue
        .iter()
        .map(|entry| match entry.item {
            PlayItem::Local { song_id, .. } => song_id,
            PlayItem::Remote { .. } => panic!("unexpected remote entry"),
        })
        .collect();
    assert_eq!(order, vec![a, b, c, d]);
    assert_eq!(queue[0].finish_time, 10.0);
    assert_eq!(queue[1].finish_time, 10.0);
    assert_eq!(queue[2].finish_time, 20.0);
    assert_eq!(queue[3].finish_time, 20.0);
}

#[tokio::test]
async fn s2_votes_accelerate_only_the_voted_packet_but_cascade_downstream() {
    let store = Arc::new(InMemoryPacketStore::new());
    let a = store.seed_song("a.mp3", 10.0).await;
    let b = store.seed_song("b.mp3", 10.0).await;
    let c = store.seed_song("c.mp3", 10.0).await;

    let scheduler = build_scheduler(store).await;

    scheduler.vote("u1", Some(a), None).await.unwrap();
    scheduler.vote("u1", Some(c), None).await.unwrap();
    scheduler.vote("u2", Some(b), None).await.unwrap();

    scheduler.vote("u3", Some(a), None).await.unwrap();
    let queue = scheduler.vote("u4", Some(a), None).await.unwrap();

    let by_song: std::collections::HashMap<i64, f64> = queue
        .iter()
        .map(|entry| match entry.item {
            PlayItem::Local { song_id, .. } => (song_id, entry.finish_time),
            PlayItem::Remote { .. } => panic!("unexpected remote entry"),
        })
        .collect();

    assert!((by_song[&a] - 10.0 / 3.0).abs() < 1e-9);
    assert!((by_song[&c] - (10.0 / 3.0 + 10.0)).abs() < 1e-9);
    assert_eq!(by_song[&b], 10.0);

    let order: Vec<i64> = queue
        .iter()
        .map(|entry| match entry.item {
            PlayItem::Local { song_id, .. } => song_id,
            PlayItem::Remote { .. } => unreachable!(),
        })
        .collect();
    assert_eq!(order, vec![a, b, c]);
}

#[tokio::test]
async fn s3_skip_adjusts_virtual_time() {
    let store = Arc::new(InMemoryPacketStore::new());
    let a = store.seed_song("a.mp3", 60.0).await;
    let scheduler = build_scheduler(store).await;

    scheduler.vote("u1", Some(a), None).await.unwrap();
    let played = scheduler.advance(false).await.unwrap();
    assert_eq!(played, Some(PlayItem::Local { song_id: a, path: "a.mp3".to_string() }));

    let queue = scheduler
        .remove(PacketKey::Local(a), true)
        .await
        .unwrap();
    assert!(queue.is_empty());
    assert!(scheduler.empty().await);
}

#[tokio::test]
async fn s4_random_fallback_with_repeat_prevention() {
    let store = Arc::new(InMemoryPacketStore::new());
    store.seed_song("a.mp3", 10.0).await;
    store.seed_song("b.mp3", 10.0).await;
    store.seed_song("c.mp3", 10.0).await;
    store.seed_song("d.mp3", 10.0).await;

    let scheduler = build_scheduler(store).await;

    // `advance` both removes the packet that just played and looks for the
    // next one in the same call; with no other votes arriving, that leaves a
    // `None` turn between plays (the store goes briefly empty after the
    // removal, refilling only on the following call) — exactly the
    // "Ticker calls advance again next tick while has_ended() stays true"
    // behavior of the original. Collect plays until four distinct picks are
    // observed, capped well above the 8 calls that requires.
    let mut picks = Vec::new();
    for _ in 0..20 {
        if picks.len() == 4 {
            break;
        }
        if let Some(PlayItem::Local { path, .. }) = scheduler.advance(false).await.unwrap() {
            picks.push(path);
        }
    }

    let unique: std::collections::HashSet<_> = picks.iter().collect();
    assert_eq!(picks.len(), 4, "expected four plays within the call budget: {picks:?}");
    assert_eq!(unique.len(), 4, "all four songs should have been played with no repeats: {picks:?}");
}

#[tokio::test]
async fn s5_duplicate_vote_is_rejected_and_queue_is_unchanged() {
    let store = Arc::new(InMemoryPacketStore::new());
    let a = store.seed_song("a.mp3", 10.0).await;
    let scheduler = build_scheduler(store).await;

    let queue_before = scheduler.vote("u1", Some(a), None).await.unwrap();
    let err = scheduler.vote("u1", Some(a), None).await.unwrap_err();
    assert!(matches!(err, SchedulerError::AlreadyVoted { ref user } if user == "u1"));

    let queue_after = scheduler.queue(None).await.unwrap();
    assert_eq!(queue_before, queue_after);
}

#[tokio::test]
async fn s6_unsupported_remote_source_is_rejected() {
    let store = Arc::new(InMemoryPacketStore::new());
    let scheduler = build_scheduler(store).await;

    let err = scheduler
        .vote("u1", None, Some("http://example.com/x".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::UnsupportedSource { url } if url == "http://example.com/x"));

    assert_eq!(scheduler.num_queued().await.unwrap(), 0);
}

#[tokio::test]
async fn vote_requires_exactly_one_of_song_id_or_video_url() {
    let store = Arc::new(InMemoryPacketStore::new());
    let scheduler = build_scheduler(store).await;

    let err = scheduler.vote("u1", None, None).await.unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidArgument));

    let err = scheduler
        .vote("u1", Some(1), Some("https://youtu.be/abc".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidArgument));
}

#[tokio::test]
async fn remote_vote_enqueues_with_fetched_metadata() {
    let store = Arc::new(InMemoryPacketStore::new());
    let scheduler = build_scheduler(store).await;

    let queue = scheduler
        .vote("u1", None, Some("https://youtu.be/abc123".to_string()))
        .await
        .unwrap();

    assert_eq!(queue.len(), 1);
    match &queue[0].item {
        PlayItem::Remote { url, title, length } => {
            assert_eq!(url, "https://youtu.be/abc123");
            assert_eq!(title, "title for https://youtu.be/abc123");
            assert_eq!(*length, 42.0);
        }
        PlayItem::Local { .. } => panic!("expected a remote entry"),
    }
}

#[tokio::test]
async fn remove_of_unknown_packet_is_not_found() {
    let store = Arc::new(InMemoryPacketStore::new());
    let scheduler = build_scheduler(store).await;

    let err = scheduler.remove(PacketKey::Local(999), false).await.unwrap_err();
    assert!(matches!(err, SchedulerError::NotFound { .. }));
}
