//! Domain entities and business rules

pub mod chain;
pub mod config;
pub mod graph;
pub mod media;
pub mod presets;
pub mod projector;
pub mod protocol;
pub mod session;
pub mod settings;
pub mod store;
pub mod worker;

// Re-export specific items to avoid ambiguous glob imports
pub use chain::*;
pub use config::{AppConfig, AuraliftConfig, ConfigError, ConfigManager, PageConfig, StoreConfig};
pub use graph::*;
pub use media::{
    AudioInfo, ClaimedSource, ElementId, MediaElement, MediaKind, MemoryPage, NetworkState,
    PageError, PageEvent, PageView, ReadyState,
};
pub use presets::Preset;
pub use projector::{db_to_gain, BYPASS_COMPRESSOR, LOUDNESS_CURVE, SMART_VOLUME_COMPRESSOR};
pub use protocol::{
    control_channel, ControlEndpoint, ControlPort, ProtocolError, Request, Responder, Response,
};
pub use session::Session;
pub use settings::*;
pub use store::{
    domain_key, preset_key, tab_key, MemoryStore, SettingsService, SettingsStore, StoreError,
    GLOBAL_KEY,
};
pub use worker::{EnhancerWorker, WorkerError, WorkerEvent};
