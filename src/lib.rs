pub mod cli;
pub mod config;
pub mod environment;
pub mod events;
pub mod host;
pub mod identifier;
pub mod preset;
pub mod preset_store;
pub mod scale;
pub mod time;

pub use config::{EngineSettings, ScaleConfig};
pub use host::{ScaleHost, SessionInfo, TextSnapshot};
pub use preset::OverrideRecord;
pub use preset_store::PresetStore;
pub use scale::ScaleEngine;
