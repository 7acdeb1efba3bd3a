//! Example walking through the settings pipeline end to end
//!
//! Run with: cargo run --package auralift-core --example settings_demo

use auralift_core::domain::chain::PageContext;
use auralift_core::domain::media::{
    ElementId, MediaElement, MediaKind, MemoryPage, NetworkState, ReadyState,
};
use auralift_core::domain::presets;
use auralift_core::domain::projector;
use auralift_core::domain::session::Session;
use auralift_core::domain::settings::SettingsPatch;
use auralift_core::domain::store::{MemoryStore, SettingsService};
use auralift_core::domain::worker::EnhancerWorker;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("auralift_core=debug,info")
        .init();

    println!("=== Auralift Settings Pipeline Demo ===\n");

    let domain = "music.example.com";

    // 1. Seed the store with factory defaults
    println!("1. Seeding global settings...");
    let worker = Arc::new(EnhancerWorker::new(SettingsService::new(MemoryStore::new())));
    let seeded = worker.install().await?;
    println!("   ✓ Seeded: {}", seeded);

    // 2. Toggle the master switch for one domain
    println!("\n2. Toggling the master switch for {}...", domain);
    let enabled = worker.toggle(domain).await?;
    println!("   ✓ Enhancer is now {}", if enabled { "ON" } else { "OFF" });
    let enabled = worker.toggle(domain).await?;
    println!("   ✓ Enhancer is now {}", if enabled { "ON" } else { "OFF" });

    // 3. Apply a built-in preset
    println!("\n3. Applying the 'movie' preset...");
    let settings = worker.apply_preset(domain, "movie").await?;
    println!(
        "   ✓ Preamp {} dB, compressor {}:1 at {} dB",
        settings.preamp, settings.compression_ratio, settings.compression_threshold
    );
    println!("   Available presets:");
    for preset in presets::all().iter().take(5) {
        println!("   - {} ({})", preset.id, preset.label);
    }
    println!("   ... and {} more", presets::all().len() - 5);

    // 4. Layered resolution: another domain still sees the global record
    println!("\n4. Resolving settings per domain:");
    let here = worker.service().resolve(Some(domain), None).await?;
    let elsewhere = worker.service().resolve(Some("other.example"), None).await?;
    println!("   {} preamp: {} dB", domain, here.preamp);
    println!("   other.example preamp: {} dB", elsewhere.preamp);

    // 5. Project the resolved record onto a processing chain
    println!("\n5. Projecting onto a chain...");
    let context = PageContext::new(48000);
    let mut chain = context.build_chain();
    projector::apply(&mut chain, &here);
    println!("   ✓ Preamp gain: {:.3}", chain.preamp.gain);
    println!("   ✓ Band gains: {:?}", chain.band_gains());

    // 6. Drive a live session through the control port
    println!("\n6. Running a session over an in-memory page...");
    let page = Arc::new(MemoryPage::new());
    page.insert(MediaElement {
        id: ElementId::new("demo-track".to_string()),
        kind: MediaKind::Audio,
        src: "demo-track.mp3".to_string(),
        mime_hint: None,
        ready: ReadyState::HaveEnoughData,
        network: NetworkState::Idle,
        channel_count: 2,
        duration_secs: Some(241.0),
        buffered: true,
    });

    let (session, port) = Session::new(page, worker.clone(), domain.to_string(), 48000);
    let session_task = tokio::spawn(session.run());

    println!("   Status: enabled = {}", port.status().await?);
    let info = port.audio_info().await?;
    println!(
        "   Audio info: {} / {} / {}",
        info.codec.as_deref().unwrap_or("-"),
        info.channels.as_deref().unwrap_or("-"),
        info.duration.as_deref().unwrap_or("-")
    );

    port.update_settings(SettingsPatch::enabled(false)).await?;
    println!("   After live patch: enabled = {}", port.status().await?);

    session_task.abort();

    println!("\n=== Demo Complete ===");
    Ok(())
}
