mod common;

use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use guarddesk_core::config::VoiceConfig;
use guarddesk_core::types::{SessionState, Variant};

use common::Harness;

const REPLY: &str = r#"{"message": "Three guards on shift tonight."}"#;

#[tokio::test(start_paused = true)]
async fn test_orb_follows_session_phases() {
    let h = Harness::new(Variant::Manager);
    h.dialogue.push_json(REPLY);
    let session = h.session();
    let (orb, frames) = session.orb_animation();
    assert!(orb.is_running());

    session.submit_text("Who is on shift tonight?").unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.state(), SessionState::Thinking);
    assert!(frames.borrow().synthetic);

    // Reply at 100ms, then 400ms of speech.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(session.state(), SessionState::Speaking);
    {
        let frame = frames.borrow();
        assert!(!frame.synthetic);
        assert_eq!(frame.bands.len(), guarddesk_voice::orb::DEFAULT_BANDS);
        assert!(frame.level > 0.0);
    }

    session.wait_until_idle().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(frames.borrow().synthetic);

    orb.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_orb_uses_configured_frame_rate() {
    let h = Harness::new(Variant::Manager);
    let session = h.session_with(VoiceConfig {
        orb_fps: 10,
        ..VoiceConfig::default()
    });
    let (orb, mut frames) = session.orb_animation();

    tokio::time::sleep(Duration::from_millis(1)).await;
    frames.borrow_and_update();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!frames.has_changed().unwrap());
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(frames.has_changed().unwrap());

    drop(orb);
    tokio::time::sleep(Duration::from_millis(1)).await;
    frames.borrow_and_update();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(frames.has_changed().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_subtitles_track_spoken_reply() {
    let h = Harness::new(Variant::Manager);
    h.dialogue.push_json(REPLY);
    let session = h.session();
    assert!(session.subtitle_timeline().is_none());

    session.submit_text("Who is on shift tonight?").unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(session.state(), SessionState::Speaking);

    let timeline = session.subtitle_timeline().unwrap();
    assert_eq!(timeline.words().len(), 5);
    assert_eq!(timeline.words()[0], "Three");
    let spoken = timeline.per_word() * 5;
    assert!(spoken.abs_diff(Duration::from_millis(400)) < Duration::from_micros(1));

    let (highlight, mut highlighted) = watch::channel(None);
    let ticker = timeline.spawn_ticker(highlight, CancellationToken::new());
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(*highlighted.borrow_and_update(), Some(0));
    ticker.await.unwrap();
    assert_eq!(*highlighted.borrow(), None);

    session.wait_until_idle().await;
    assert!(session.subtitle_timeline().is_none());
}
