//! Integration tests for the enhancement pipeline
//!
//! These tests wire the real directory host and the real JSON file store to
//! the session loop and drive the stack the way the daemon binary does:
//! media files appear on disk, settings land in the store, and control
//! requests flow through the port.

use auralift_core::domain::presets;
use auralift_core::domain::protocol::ControlPort;
use auralift_core::domain::session::Session;
use auralift_core::domain::settings::SettingsPatch;
use auralift_core::domain::store::SettingsService;
use auralift_core::domain::worker::EnhancerWorker;
use auralift_infra::host::DirectoryPage;
use auralift_infra::store::{FileStore, StoreWatcher};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

const DOMAIN: &str = "music.example.com";
const SAMPLE_RATE: u32 = 48000;

fn write_media(dir: &Path, name: &str) {
    std::fs::write(dir.join(name), b"not a real bitstream, but present").unwrap();
}

fn worker_over(store_path: &Path) -> EnhancerWorker<FileStore> {
    EnhancerWorker::new(SettingsService::new(FileStore::new(
        store_path.to_path_buf(),
    )))
}

/// Build the same stack the daemon builds: seeded worker, directory page,
/// session task, control port.
async fn start_stack(
    media_dir: &Path,
    store_path: &Path,
) -> (
    Arc<DirectoryPage>,
    Arc<EnhancerWorker<FileStore>>,
    ControlPort,
    tokio::task::JoinHandle<()>,
) {
    let worker = Arc::new(worker_over(store_path));
    worker.install().await.unwrap();

    let page = Arc::new(DirectoryPage::open(media_dir).await.unwrap());
    let (session, port) = Session::new(page.clone(), worker.clone(), DOMAIN.to_string(), SAMPLE_RATE);
    let handle = tokio::spawn(session.run());
    (page, worker, port, handle)
}

async fn wait_for_codec(port: &ControlPort, want: Option<&str>) {
    for _ in 0..200 {
        if port.audio_info().await.unwrap().codec.as_deref() == want {
            return;
        }
        sleep(Duration::from_millis(25)).await;
    }
    panic!("audio info never reported codec {:?}", want);
}

/// The channels field is only populated from a successfully claimed source,
/// so it is the observable proof of attachment.
async fn wait_for_channels(port: &ControlPort, want: Option<&str>) {
    for _ in 0..200 {
        if port.audio_info().await.unwrap().channels.as_deref() == want {
            return;
        }
        sleep(Duration::from_millis(25)).await;
    }
    panic!("audio info never reported channels {:?}", want);
}

// ============================================================================
// DAEMON WIRING TESTS
// ============================================================================

#[tokio::test]
async fn test_media_present_at_startup_gets_attached() {
    let media = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    write_media(media.path(), "album.mp3");
    write_media(media.path(), "notes.txt");

    let (_page, _worker, port, handle) =
        start_stack(media.path(), &store.path().join("settings.json")).await;

    wait_for_channels(&port, Some("Stereo")).await;

    let info = port.audio_info().await.unwrap();
    assert_eq!(info.sample_rate, Some(SAMPLE_RATE));
    assert_eq!(info.codec.as_deref(), Some("MP3"));
    assert!(port.status().await.unwrap());

    handle.abort();
}

#[tokio::test]
async fn test_media_added_while_running_gets_attached() {
    let media = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();

    let (_page, _worker, port, handle) =
        start_stack(media.path(), &store.path().join("settings.json")).await;
    assert_eq!(port.audio_info().await.unwrap().channels, None);

    write_media(media.path(), "late.flac");

    wait_for_codec(&port, Some("FLAC")).await;
    wait_for_channels(&port, Some("Stereo")).await;
    handle.abort();
}

#[tokio::test]
async fn test_removed_media_frees_its_slot() {
    let media = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    write_media(media.path(), "song.mp3");

    let (_page, _worker, port, handle) =
        start_stack(media.path(), &store.path().join("settings.json")).await;
    wait_for_channels(&port, Some("Stereo")).await;

    std::fs::remove_file(media.path().join("song.mp3")).unwrap();
    wait_for_channels(&port, None).await;

    // The same path coming back is a brand new element; a stale claim or
    // stale bookkeeping would leave it unattached
    write_media(media.path(), "song.mp3");
    wait_for_channels(&port, Some("Stereo")).await;

    handle.abort();
}

// ============================================================================
// SETTINGS PERSISTENCE TESTS
// ============================================================================

#[tokio::test]
async fn test_settings_survive_process_restart() {
    let store = tempfile::tempdir().unwrap();
    let path = store.path().join("settings.json");

    let first = worker_over(&path);
    assert!(first.install().await.unwrap());
    first
        .update_domain(
            DOMAIN,
            &SettingsPatch {
                preamp: Some(4.0),
                mono: Some(true),
                ..SettingsPatch::empty()
            },
        )
        .await
        .unwrap();
    drop(first);

    let second = worker_over(&path);
    assert!(!second.install().await.unwrap(), "defaults were re-seeded");

    let settings = second.service().resolve(Some(DOMAIN), None).await.unwrap();
    assert_eq!(settings.preamp, 4.0);
    assert!(settings.mono);
}

#[tokio::test]
async fn test_domains_are_isolated_on_disk() {
    let store = tempfile::tempdir().unwrap();
    let path = store.path().join("settings.json");

    let worker = worker_over(&path);
    worker.install().await.unwrap();
    worker
        .update_domain(
            "a.example",
            &SettingsPatch {
                preamp: Some(3.0),
                ..SettingsPatch::empty()
            },
        )
        .await
        .unwrap();
    assert!(!worker.toggle("b.example").await.unwrap());

    let a = worker.service().resolve(Some("a.example"), None).await.unwrap();
    assert!(a.enabled);
    assert_eq!(a.preamp, 3.0);

    let b = worker.service().resolve(Some("b.example"), None).await.unwrap();
    assert!(!b.enabled);
    assert_eq!(b.preamp, 0.0);
}

#[tokio::test]
async fn test_store_file_uses_flat_key_layout() {
    let store = tempfile::tempdir().unwrap();
    let path = store.path().join("settings.json");

    let worker = worker_over(&path);
    worker.install().await.unwrap();
    worker.toggle(DOMAIN).await.unwrap();
    worker.apply_preset(DOMAIN, "movie").await.unwrap();

    // The written file is one flat JSON object keyed the way control
    // surfaces expect
    let text = std::fs::read_to_string(&path).unwrap();
    let map: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(map["globalSettings"]["enabled"], serde_json::json!(true));
    assert_eq!(
        map["domainSettings_music.example.com"]["enabled"],
        serde_json::json!(false)
    );
    assert_eq!(
        map["domainPreset_music.example.com"],
        serde_json::json!("movie")
    );
}

#[tokio::test]
async fn test_preset_round_trips_through_store() {
    let store = tempfile::tempdir().unwrap();
    let path = store.path().join("settings.json");

    let worker = worker_over(&path);
    worker.install().await.unwrap();
    worker.apply_preset(DOMAIN, "movie").await.unwrap();

    // A separate service over the same file sees the applied preset
    let service = SettingsService::new(FileStore::new(path));
    assert_eq!(service.active_preset(DOMAIN).await.unwrap().as_deref(), Some("movie"));

    let settings = service.resolve(Some(DOMAIN), None).await.unwrap();
    let patch = presets::find("movie").unwrap().patch;
    assert_eq!(Some(settings.preamp), patch.preamp);
    assert_eq!(Some(settings.compression_threshold), patch.compression_threshold);
    assert_eq!(Some(settings.compression_ratio), patch.compression_ratio);
}

// ============================================================================
// LIVE CONTROL TESTS
// ============================================================================

#[tokio::test]
async fn test_worker_toggle_reaches_live_session() {
    let media = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    write_media(media.path(), "song.mp3");

    let (_page, worker, port, handle) =
        start_stack(media.path(), &store.path().join("settings.json")).await;
    assert!(port.status().await.unwrap());

    assert!(!worker.toggle(DOMAIN).await.unwrap());

    let mut flipped = false;
    for _ in 0..200 {
        if !port.status().await.unwrap() {
            flipped = true;
            break;
        }
        sleep(Duration::from_millis(25)).await;
    }
    assert!(flipped, "toggle never propagated to the session");

    handle.abort();
}

#[tokio::test]
async fn test_port_patch_is_volatile() {
    let media = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    let path = store.path().join("settings.json");

    let (_page, worker, port, handle) = start_stack(media.path(), &path).await;

    assert!(port.update_settings(SettingsPatch::enabled(false)).await.unwrap());
    assert!(!port.status().await.unwrap());

    // The port edits the live model only; the store never saw the flip
    let stored = worker.service().resolve(Some(DOMAIN), None).await.unwrap();
    assert!(stored.enabled);

    handle.abort();
}

#[tokio::test]
async fn test_external_store_write_is_forwardable() {
    let media = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    let path = store.path().join("settings.json");

    let (_page, worker, port, handle) = start_stack(media.path(), &path).await;
    assert!(port.status().await.unwrap());

    let watcher = StoreWatcher::new(&path).await.unwrap();
    let mut changes = watcher.subscribe();

    // A separate process edits the store; its worker events cannot reach
    // this session, only the file change can
    let other_process = worker_over(&path);
    other_process
        .update_domain(DOMAIN, &SettingsPatch::enabled(false))
        .await
        .unwrap();

    timeout(Duration::from_secs(5), changes.recv())
        .await
        .expect("no store change notification")
        .unwrap();

    // What the daemon does on a tick: re-resolve and push the full record
    let resolved = worker.service().resolve(Some(DOMAIN), None).await.unwrap();
    assert!(port.update_settings(SettingsPatch::from(resolved)).await.unwrap());
    assert!(!port.status().await.unwrap());

    handle.abort();
}
