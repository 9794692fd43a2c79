use crate::config::ScaleConfigOverrides;
use crate::preset::PresetSort;
use crate::preset_store::PRESET_FILE_NAME;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;
use uuid::Uuid;

pub const DEFAULT_CONFIG_DIR: &str = "config";
pub const CONFIG_FILE_NAME: &str = "scaleme.json";

#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    List { search: Option<String>, category: Option<String>, sort: PresetSort },
    Add { identifier: String, scale: f32, display_name: Option<String> },
    Remove { identifier: String },
    Toggle { identifier: String },
    Category { identifier: String, category: String },
    Categories,
    Classify { address: String, text: String },
    Resolve { entity: Uuid, name: Option<String> },
    Status,
    SaveConfig,
    Help,
}

#[derive(Debug, Clone)]
pub struct CliOptions {
    pub presets: PathBuf,
    pub config: PathBuf,
    pub overrides: ScaleConfigOverrides,
    pub command: CliCommand,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            presets: PathBuf::from(DEFAULT_CONFIG_DIR).join(PRESET_FILE_NAME),
            config: PathBuf::from(DEFAULT_CONFIG_DIR).join(CONFIG_FILE_NAME),
            overrides: ScaleConfigOverrides::default(),
            command: CliCommand::Help,
        }
    }
}

impl CliOptions {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = CliOptions::default();
        let mut iter = args.into_iter().map(|arg| arg.as_ref().to_string());
        let _ = iter.next(); // skip program name if present
        let mut rest: Vec<String> = Vec::new();
        while let Some(flag) = iter.next() {
            if !flag.starts_with("--") {
                rest.push(flag);
                rest.extend(iter.by_ref());
                break;
            }
            let key = &flag[2..];
            if key == "help" {
                options.command = CliCommand::Help;
                return Ok(options);
            }
            let value = iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?;
            match key {
                "presets" => options.presets = PathBuf::from(value),
                "config" => options.config = PathBuf::from(value),
                "self-scale" => options.overrides.self_scale = Some(parse_scale(&value)?),
                "others-scale" => options.overrides.others_scale = Some(parse_scale(&value)?),
                "gating" => options.overrides.gating_enabled = Some(parse_bool_flag("gating", &value)?),
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --presets, --config, --self-scale, --others-scale, --gating."
                ),
            }
        }
        options.command = parse_command(&rest)?;
        Ok(options)
    }
}

fn parse_command(args: &[String]) -> Result<CliCommand> {
    let Some((name, args)) = args.split_first() else {
        return Ok(CliCommand::Help);
    };
    let command = match name.as_str() {
        "list" => parse_list(args)?,
        "add" => {
            let identifier = required(args, 0, "identifier")?;
            let scale = parse_scale(required(args, 1, "scale")?)?;
            let display_name = (args.len() > 2).then(|| args[2..].join(" "));
            CliCommand::Add { identifier: identifier.to_string(), scale, display_name }
        }
        "remove" => CliCommand::Remove { identifier: args.join(" ") },
        "toggle" => CliCommand::Toggle { identifier: args.join(" ") },
        "category" => CliCommand::Category {
            identifier: required(args, 0, "identifier")?.to_string(),
            category: required(args, 1, "category")?.to_string(),
        },
        "categories" => CliCommand::Categories,
        "classify" => parse_classify(args)?,
        "resolve" => {
            let raw = required(args, 0, "entity id")?;
            let entity = Uuid::parse_str(raw).with_context(|| format!("Invalid entity id '{raw}'"))?;
            CliCommand::Resolve { entity, name: args.get(1).cloned() }
        }
        "status" => CliCommand::Status,
        "save-config" => CliCommand::SaveConfig,
        "help" => CliCommand::Help,
        other => bail!("Unknown command '{other}'. Run with 'help' for usage."),
    };
    if let CliCommand::Remove { identifier } | CliCommand::Toggle { identifier } = &command {
        if identifier.trim().is_empty() {
            bail!("Command '{name}' needs an identifier");
        }
    }
    Ok(command)
}

fn parse_list(args: &[String]) -> Result<CliCommand> {
    let mut search = None;
    let mut category = None;
    let mut sort = PresetSort::default();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let value = iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?;
        match flag.as_str() {
            "--search" => search = Some(value.clone()),
            "--category" => category = Some(value.clone()),
            "--sort" => sort = parse_sort(value)?,
            _ => bail!("Unknown list option '{flag}'. Use --search, --category or --sort."),
        }
    }
    Ok(CliCommand::List { search, category, sort })
}

fn parse_classify(args: &[String]) -> Result<CliCommand> {
    match args {
        [flag, address, text @ ..] if flag == "--address" => {
            Ok(CliCommand::Classify { address: address.clone(), text: text.join(" ") })
        }
        _ => bail!("Usage: classify --address <server address> <text...>"),
    }
}

fn required<'a>(args: &'a [String], index: usize, what: &str) -> Result<&'a str> {
    args.get(index).map(String::as_str).ok_or_else(|| anyhow!("Missing {what}"))
}

fn parse_scale(value: &str) -> Result<f32> {
    let scale = value.parse::<f32>().with_context(|| format!("Invalid scale '{value}'"))?;
    if !scale.is_finite() {
        bail!("Invalid scale '{value}'");
    }
    Ok(scale)
}

fn parse_sort(value: &str) -> Result<PresetSort> {
    match value.to_ascii_lowercase().as_str() {
        "name" => Ok(PresetSort::Name),
        "category" => Ok(PresetSort::Category),
        "scale" => Ok(PresetSort::Scale),
        "enabled" => Ok(PresetSort::Enabled),
        other => bail!("Invalid sort '{other}'. Use name, category, scale or enabled."),
    }
}

fn parse_bool_flag(flag: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => bail!("Invalid {flag} value '{other}'. Use on/off or true/false."),
    }
}

pub fn usage() -> &'static str {
    "Scale preset tool

Usage:
  scaleme [--presets <path>] [--config <path>] [--self-scale <v>] [--others-scale <v>] [--gating on|off] <command>

Commands:
  list [--search <text>] [--category <label>] [--sort name|category|scale|enabled]
  add <identifier> <scale> [display name...]
  remove <identifier>
  toggle <identifier>
  category <identifier> <category>
  categories
  classify --address <server address> <text...>
  resolve <entity uuid> [name]
  status
  save-config        write the effective config (overrides included) to --config
  help

Scale range: 0.1x to 3.0x. UUIDs are detected automatically."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_then_command() {
        let args = ["scaleme", "--presets", "p.json", "--gating", "off", "add", "Notch", "1.5", "The", "Creator"];
        let options = CliOptions::parse(args).expect("parse");
        assert_eq!(options.presets, PathBuf::from("p.json"));
        assert_eq!(options.overrides.gating_enabled, Some(false));
        assert_eq!(
            options.command,
            CliCommand::Add {
                identifier: "Notch".into(),
                scale: 1.5,
                display_name: Some("The Creator".into())
            }
        );
    }

    #[test]
    fn no_command_means_help() {
        let options = CliOptions::parse(["scaleme"]).expect("parse");
        assert_eq!(options.command, CliCommand::Help);
    }

    #[test]
    fn list_options_parse() {
        let options = CliOptions::parse(["scaleme", "list", "--sort", "SCALE", "--category", "friends"])
            .expect("parse");
        assert_eq!(
            options.command,
            CliCommand::List { search: None, category: Some("friends".into()), sort: PresetSort::Scale }
        );
    }

    #[test]
    fn classify_joins_text() {
        let options =
            CliOptions::parse(["scaleme", "classify", "--address", "mc.hypixel.net", "BED", "WARS"]).expect("parse");
        assert_eq!(
            options.command,
            CliCommand::Classify { address: "mc.hypixel.net".into(), text: "BED WARS".into() }
        );
    }

    #[test]
    fn status_and_save_config_take_no_arguments() {
        let options = CliOptions::parse(["scaleme", "--self-scale", "2", "status"]).expect("parse");
        assert_eq!(options.command, CliCommand::Status);
        assert_eq!(options.overrides.self_scale, Some(2.0));
        let options = CliOptions::parse(["scaleme", "--config", "c.json", "save-config"]).expect("parse");
        assert_eq!(options.command, CliCommand::SaveConfig);
        assert_eq!(options.config, PathBuf::from("c.json"));
    }

    #[test]
    fn missing_value_errors() {
        let err = CliOptions::parse(["scaleme", "--presets"]).unwrap_err();
        assert!(err.to_string().contains("Expected a value"), "error should mention missing value");
    }

    #[test]
    fn rejects_bad_input() {
        assert!(CliOptions::parse(["scaleme", "--foo", "bar"]).is_err());
        assert!(CliOptions::parse(["scaleme", "add", "Notch", "big"]).is_err());
        assert!(CliOptions::parse(["scaleme", "remove"]).is_err());
        assert!(CliOptions::parse(["scaleme", "resolve", "not-a-uuid"]).is_err());
        assert!(CliOptions::parse(["scaleme", "frobnicate"]).is_err());
    }
}
