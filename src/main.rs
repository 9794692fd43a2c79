use anyhow::{anyhow, Result};
use scaleme_engine::cli::{usage, CliCommand, CliOptions};
use scaleme_engine::config::ScaleConfig;
use scaleme_engine::host::{ScaleHost, SessionInfo, TextSnapshot};
use scaleme_engine::identifier::is_stable_id;
use scaleme_engine::preset::OverrideRecord;
use scaleme_engine::preset_store::PresetStore;
use scaleme_engine::scale::ScaleEngine;
use std::process;
use std::sync::Arc;
use uuid::Uuid;

/// Offline stand-in for a game client: one fixed session, text and name.
struct CliHost {
    config: ScaleConfig,
    session: SessionInfo,
    text: TextSnapshot,
    name: Option<String>,
}

impl ScaleHost for CliHost {
    fn session(&self) -> Option<SessionInfo> {
        Some(self.session.clone())
    }

    fn display_name(&self, _entity: Uuid) -> Option<String> {
        self.name.clone()
    }

    fn text_snapshot(&self) -> TextSnapshot {
        self.text.clone()
    }

    fn config(&self) -> ScaleConfig {
        self.config
    }
}

fn main() {
    env_logger::init();
    let options = match CliOptions::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            process::exit(2);
        }
    };
    if let Err(err) = run(options) {
        eprintln!("scaleme error: {err:?}");
        process::exit(1);
    }
}

fn run(options: CliOptions) -> Result<()> {
    if options.command == CliCommand::Help {
        println!("{}", usage());
        return Ok(());
    }
    let mut config = ScaleConfig::load_or_default(&options.config);
    if !options.overrides.is_empty() {
        config.apply_overrides(&options.overrides);
        log::info!("Applied overrides: {}", options.overrides.applied_fields().join(", "));
    }
    let presets = Arc::new(PresetStore::open(&options.presets));

    match options.command {
        CliCommand::List { search, category, sort } => {
            let records = presets.filtered(search.as_deref(), category.as_deref(), sort);
            if records.is_empty() {
                println!("No presets found.");
            }
            for record in records {
                println!(
                    "- {} ({}: {}) - {:.1}x [{}] {}",
                    record.label(),
                    record.kind_label(),
                    record.identifier,
                    record.scale,
                    record.category,
                    if record.enabled { "[Enabled]" } else { "[Disabled]" }
                );
            }
        }
        CliCommand::Add { identifier, scale, display_name } => {
            let mut record = OverrideRecord::new(identifier.clone(), scale).with_category("command");
            record.display_name = display_name;
            let scale = record.scale;
            if !presets.add(record) {
                return Err(anyhow!("preset identifier must not be empty"));
            }
            println!("Added preset for: {identifier} (Scale: {scale}x)");
        }
        CliCommand::Remove { identifier } => {
            let stable = is_stable_id(&identifier.to_lowercase());
            if presets.remove(&identifier, stable) {
                println!("Removed preset for: {identifier}");
            } else {
                println!("No preset found for: {identifier}");
            }
        }
        CliCommand::Toggle { identifier } => match presets.toggle(&identifier) {
            Some(enabled) => {
                println!("Preset for {identifier} is now {}", if enabled { "enabled" } else { "disabled" })
            }
            None => return Err(anyhow!("No preset found for: {identifier}")),
        },
        CliCommand::Category { identifier, category } => {
            if !presets.set_category(&identifier, &category) {
                return Err(anyhow!("No preset found for: {identifier}"));
            }
            println!("Updated category for {identifier} to: {category}");
        }
        CliCommand::Categories => {
            for label in presets.categories() {
                println!("{label}");
            }
        }
        CliCommand::Classify { address, text } => {
            let engine = ScaleEngine::new(Arc::clone(&presets));
            let host = CliHost {
                config,
                session: SessionInfo::new(Uuid::nil()).with_address(address),
                text: TextSnapshot::from_scoreboard(text),
                name: None,
            };
            engine.refresh_environment(&host);
            println!("{}", engine.status(&config));
        }
        CliCommand::Resolve { entity, name } => {
            let engine = ScaleEngine::new(Arc::clone(&presets));
            let host = CliHost {
                config,
                session: SessionInfo::new(Uuid::nil()),
                text: TextSnapshot::default(),
                name,
            };
            let current = engine.current_scale(&host, entity);
            let target = engine.resolve_target(&host, entity, entity == Uuid::nil());
            println!("{entity}: current {current:.3}x, target {target:.3}x");
        }
        CliCommand::Status => {
            let engine = ScaleEngine::new(Arc::clone(&presets));
            let host = CliHost {
                config,
                session: SessionInfo::new(Uuid::nil()),
                text: TextSnapshot::default(),
                name: None,
            };
            engine.refresh_environment(&host);
            println!("Self scale: {:.2}x", config.self_scale);
            if config.others_scaling_enabled {
                println!("Others scale: {:.2}x", config.others_scale);
            } else {
                println!("Others scale: off");
            }
            println!("Presets: {} ({})", engine.presets().len(), if config.presets_enabled { "on" } else { "off" });
            println!("{}", engine.status(&config));
        }
        CliCommand::SaveConfig => {
            config.save(&options.config)?;
            println!("Saved config to {}", options.config.display());
        }
        CliCommand::Help => println!("{}", usage()),
    }
    Ok(())
}
