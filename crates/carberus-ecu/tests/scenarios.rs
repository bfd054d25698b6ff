//! End-to-end behaviour of the fused channels against mock hardware.

use carberus_biometric::{BiometricChannel, FaceDetector, Frame, Recognizer, Region, Score};
use carberus_core::config::BiometricConfig;
use carberus_core::constants::{DEFAULT_MANUFACTURER_ID, DEFAULT_TOKEN_KEY};
use carberus_core::{AuthSource, ReplayScope};
use carberus_door::DoorController;
use carberus_ecu::{Arbiter, EventLoop, UnlockDecision, spawn_scanner};
use carberus_hardware::mock::{MockCamera, MockDoorHandle, MockDoorLink};
use carberus_token::{Advertisement, TokenChannel, TokenCipher, TokenPacket};
use rstest::rstest;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::time::Instant;

const COOLDOWN: Duration = Duration::from_secs(5);
const TICK: Duration = Duration::from_millis(50);
const CAPTURE_TIMEOUT: Duration = Duration::from_millis(200);

fn advertisement_line(counter: u32) -> String {
    let cipher = TokenCipher::new(&DEFAULT_TOKEN_KEY);
    let payload = cipher.seal(&TokenPacket::unlock([1, 2, 3, 4], counter));
    Advertisement::new()
        .with_manufacturer_data(DEFAULT_MANUFACTURER_ID, payload.to_vec())
        .to_line()
        + "\n"
}

fn connected_arbiter() -> (Arbiter, MockDoorHandle) {
    let (link, handle) = MockDoorLink::new();
    let mut door = DoorController::new();
    door.attach(link);
    (Arbiter::new(door, COOLDOWN), handle)
}

fn token_loop_with_capacity(arbiter: Arbiter, capacity: usize) -> (EventLoop, DuplexStream) {
    let (writer, reader) = tokio::io::duplex(4096);
    let channel = TokenChannel::new(TokenCipher::new(&DEFAULT_TOKEN_KEY), ReplayScope::Global);
    let feed = spawn_scanner(reader, channel, DEFAULT_MANUFACTURER_ID, capacity);
    (EventLoop::new(arbiter, TICK).with_token_feed(feed), writer)
}

fn token_loop(arbiter: Arbiter) -> (EventLoop, DuplexStream) {
    token_loop_with_capacity(arbiter, 16)
}

/// Let the scanner task consume what was written.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Whether the scanner let go of its end of the feed.
async fn feed_closed(feed: &mut DuplexStream) -> bool {
    feed.write_all(advertisement_line(1000).as_bytes())
        .await
        .is_err()
}

/// Recognizer reporting a fixed distance for identity 1.
struct FixedDistance(f64);

impl Recognizer for FixedDistance {
    fn score(&self, _face: &Frame) -> carberus_biometric::error::Result<Score> {
        Ok(Score::new(1, self.0))
    }
}

/// Recognizer that crashes on its first face, then matches identity 1.
struct CrashesOnce(AtomicBool);

impl Recognizer for CrashesOnce {
    fn score(&self, _face: &Frame) -> carberus_biometric::error::Result<Score> {
        if self.0.swap(false, Ordering::SeqCst) {
            panic!("recognizer crashed");
        }
        Ok(Score::new(1, 10.0))
    }
}

struct WholeFrame;

impl FaceDetector for WholeFrame {
    fn detect(&self, frame: &Frame) -> carberus_biometric::error::Result<Vec<Region>> {
        Ok(vec![frame.bounds()])
    }
}

fn face_channel(recognizer: impl Recognizer + 'static) -> BiometricChannel {
    BiometricChannel::new(
        Box::new(WholeFrame),
        Box::new(recognizer),
        &BiometricConfig::default(),
    )
}

#[tokio::test]
async fn test_replayed_counters_never_reach_the_arbiter() {
    // Counters 5, 3, 5, 9 arrive; only 5 and 9 are accepted.
    let (arbiter, _door) = connected_arbiter();
    let (mut event_loop, mut feed) = token_loop(arbiter);

    for counter in [5, 3, 5, 9] {
        feed.write_all(advertisement_line(counter).as_bytes())
            .await
            .unwrap();
    }
    settle().await;
    event_loop.tick().await;

    let tokens = event_loop.token_stats();
    assert_eq!(tokens.accepted, 2);
    assert_eq!(tokens.replay_rejections, 2);
    assert_eq!(tokens.decrypt_errors, 0);
    assert_eq!(event_loop.stats().token_events, 2);

    // Both accepted tokens reached the arbiter; the second hit the cooldown.
    let arbiter = event_loop.arbiter().stats();
    assert_eq!(arbiter.unlocks_granted, 1);
    assert_eq!(arbiter.cooldown_rejections, 1);

    event_loop.shutdown().await;
}

#[tokio::test]
async fn test_full_queue_still_triggers_every_fresh_counter() {
    let (arbiter, door) = connected_arbiter();
    let (mut event_loop, mut feed) = token_loop_with_capacity(arbiter, 1);

    for counter in 1..=4 {
        feed.write_all(advertisement_line(counter).as_bytes())
            .await
            .unwrap();
    }
    for _ in 0..8 {
        settle().await;
        event_loop.tick().await;
    }

    let telemetry = event_loop.telemetry();
    assert_eq!(telemetry.tokens_accepted, 4);
    assert_eq!(event_loop.stats().token_events, 4);
    assert_eq!(telemetry.unlocks_granted + telemetry.cooldown_rejections, 4);
    assert!(telemetry.queue_stalls > 0);
    assert_eq!(door.sent_count(), 1);

    event_loop.shutdown().await;
}

#[rstest]
#[case(Duration::from_secs(3), false)]
#[case(Duration::from_secs(5), false)]
#[case(Duration::from_secs(6), true)]
#[tokio::test]
async fn test_cooldown_window(#[case] gap: Duration, #[case] unlocks_again: bool) {
    // An unlock at t=0 suppresses everything up to and including t=5s.
    let (mut arbiter, door) = connected_arbiter();
    let t0 = Instant::now();

    assert!(arbiter.decide(AuthSource::Token, None, t0).await.is_granted());
    let second = arbiter.decide(AuthSource::Token, None, t0 + gap).await;

    assert_eq!(second.is_granted(), unlocks_again);
    assert_eq!(door.sent_count(), if unlocks_again { 2 } else { 1 });
    arbiter.door_mut().close().await;
}

#[tokio::test]
async fn test_cooldown_applies_across_sources() {
    let (mut arbiter, door) = connected_arbiter();
    let t0 = Instant::now();

    let decisions = [
        arbiter.decide(AuthSource::Token, None, t0).await,
        arbiter
            .decide(AuthSource::Biometric, Some("User1"), t0 + Duration::from_secs(3))
            .await,
        arbiter
            .decide(AuthSource::Token, None, t0 + Duration::from_secs(6))
            .await,
    ];

    assert_eq!(decisions[0], UnlockDecision::Granted);
    assert!(matches!(decisions[1], UnlockDecision::CooldownActive { .. }));
    assert_eq!(decisions[2], UnlockDecision::Granted);
    assert_eq!(door.sent_count(), 2);
    assert_eq!(arbiter.last_unlock(), Some(t0 + Duration::from_secs(6)));
    arbiter.door_mut().close().await;
}

#[tokio::test(start_paused = true)]
async fn test_degraded_mode_runs_without_unlocking() {
    // No door controller: every trigger fails and the cooldown never starts.
    let arbiter = Arbiter::new(DoorController::new(), COOLDOWN);
    let (event_loop, mut feed) = token_loop(arbiter);

    let writer = tokio::spawn(async move {
        for counter in 1..=20u32 {
            feed.write_all(advertisement_line(counter).as_bytes())
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        feed
    });

    let telemetry = event_loop
        .run(tokio::time::sleep(Duration::from_secs(15)))
        .await;
    let mut feed = writer.await.unwrap();

    assert_eq!(telemetry.tokens_accepted, 20);
    assert_eq!(telemetry.unlocks_granted, 0);
    assert_eq!(telemetry.hardware_unavailable, 20);
    assert_eq!(telemetry.cooldown_rejections, 0);
    assert!(telemetry.ticks >= 250);
    assert!(feed_closed(&mut feed).await);
}

#[tokio::test]
async fn test_degraded_arbiter_never_records_unlock() {
    let mut arbiter = Arbiter::new(DoorController::new(), COOLDOWN);
    for _ in 0..5 {
        assert!(!arbiter.trigger(AuthSource::Token, None).await);
        assert!(!arbiter.trigger(AuthSource::Biometric, Some("User1")).await);
    }
    assert!(arbiter.last_unlock().is_none());
    assert_eq!(arbiter.stats().hardware_unavailable, 10);
}

#[rstest]
#[case(59.0, true)]
#[case(61.0, false)]
#[tokio::test]
async fn test_face_distance_threshold(#[case] distance: f64, #[case] unlocks: bool) {
    let (arbiter, door) = connected_arbiter();
    let (camera, camera_handle) = MockCamera::new();
    let mut event_loop = EventLoop::new(arbiter, TICK).with_camera(
        camera,
        Some(face_channel(FixedDistance(distance))),
        CAPTURE_TIMEOUT,
    );

    camera_handle.queue_frame(Frame::filled(4, 4, 0));
    event_loop.tick().await;

    assert_eq!(door.sent_count(), usize::from(unlocks));
    let telemetry = event_loop.shutdown().await;
    assert_eq!(telemetry.faces_accepted, u64::from(unlocks));
    assert!(camera_handle.is_released());
}

#[tokio::test]
async fn test_crashing_recognizer_skips_one_face_only() {
    let (arbiter, door) = connected_arbiter();
    let (camera, camera_handle) = MockCamera::new();
    let event_loop = EventLoop::new(arbiter, TICK).with_camera(
        camera,
        Some(face_channel(CrashesOnce(AtomicBool::new(true)))),
        CAPTURE_TIMEOUT,
    );
    for _ in 0..20 {
        camera_handle.queue_frame(Frame::filled(4, 4, 0));
    }

    let telemetry = event_loop
        .run(tokio::time::sleep(Duration::from_millis(400)))
        .await;

    assert_eq!(telemetry.panics, 0);
    assert_eq!(telemetry.recognition_errors, 1);
    assert!(telemetry.ticks >= 3);
    assert!(telemetry.faces_accepted >= 2);
    assert_eq!(telemetry.unlocks_granted, 1);
    assert_eq!(door.sent_count(), 1);
    assert!(camera_handle.is_released());
}

#[tokio::test]
async fn test_run_tears_down_on_shutdown() {
    let (arbiter, door) = connected_arbiter();
    let (event_loop, mut feed) = token_loop(arbiter);
    let (camera, camera_handle) = MockCamera::new();
    let event_loop = event_loop.with_camera(
        camera,
        Some(face_channel(FixedDistance(80.0))),
        CAPTURE_TIMEOUT,
    );

    feed.write_all(advertisement_line(1).as_bytes()).await.unwrap();
    let telemetry = event_loop
        .run(tokio::time::sleep(Duration::from_millis(200)))
        .await;

    assert_eq!(telemetry.panics, 0);
    assert_eq!(telemetry.unlocks_granted, 1);
    assert!(camera_handle.is_released());
    assert!(door.is_closed());
    assert!(feed_closed(&mut feed).await);
}

#[tokio::test]
async fn test_run_tears_down_after_tick_panic() {
    let (arbiter, door) = connected_arbiter();
    let (event_loop, mut feed) = token_loop(arbiter);
    let (camera, camera_handle) = MockCamera::new();
    let event_loop = event_loop.with_camera(
        camera,
        Some(face_channel(FixedDistance(80.0))),
        CAPTURE_TIMEOUT,
    );

    door.set_panic_writes(true);
    feed.write_all(advertisement_line(1).as_bytes()).await.unwrap();

    // Ends on the panic, long before the shutdown future would fire.
    let telemetry = tokio::time::timeout(
        Duration::from_secs(5),
        event_loop.run(tokio::time::sleep(Duration::from_secs(60))),
    )
    .await
    .unwrap();

    assert_eq!(telemetry.panics, 1);
    assert_eq!(telemetry.unlocks_granted, 0);
    assert!(camera_handle.is_released());
    assert!(door.is_closed());
    assert!(feed_closed(&mut feed).await);
}

#[tokio::test]
async fn test_link_lost_mid_session_degrades() {
    let (arbiter, door) = connected_arbiter();
    let (mut event_loop, mut feed) = token_loop(arbiter);

    door.set_fail_writes(true);
    feed.write_all(advertisement_line(1).as_bytes()).await.unwrap();
    settle().await;
    event_loop.tick().await;

    assert!(!event_loop.arbiter().door().is_connected());
    assert!(event_loop.arbiter().last_unlock().is_none());

    // The link does not come back on its own.
    door.set_fail_writes(false);
    feed.write_all(advertisement_line(2).as_bytes()).await.unwrap();
    settle().await;
    event_loop.tick().await;
    assert_eq!(door.sent_count(), 0);

    let telemetry = event_loop.shutdown().await;
    assert_eq!(telemetry.link_losses, 1);
    assert_eq!(telemetry.hardware_unavailable, 2);
}

#[tokio::test]
async fn test_garbage_payloads_do_not_stop_the_loop() {
    let (arbiter, door) = connected_arbiter();
    let (mut event_loop, mut feed) = token_loop(arbiter);

    let garbage = [
        "ffff:00\n".to_string(),
        format!("ffff:{}\n", "ab".repeat(17)),
        format!("ffff:{}\n", "00".repeat(16)),
        "ffff:zz\n".to_string(),
        advertisement_line(3),
    ]
    .concat();
    feed.write_all(garbage.as_bytes()).await.unwrap();
    settle().await;
    event_loop.tick().await;

    assert_eq!(door.sent_count(), 1);
    let telemetry = event_loop.shutdown().await;
    assert_eq!(telemetry.length_rejections, 2);
    assert_eq!(telemetry.non_unlock_commands, 1);
    assert_eq!(telemetry.malformed_advertisements, 1);
    assert_eq!(telemetry.tokens_accepted, 1);
    assert!(door.is_closed());
}
