//! tapeworks - terminal host for one effect engine
//!
//! Run with: cargo run -- nautilus [--config engine.json] [--bpm 120]

mod app;
mod clock;
mod ui;

use std::{fs::File, path::PathBuf, sync::Mutex};

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use tapeworks::{engine::EngineKind, EngineConfig};

use app::Tapeworks;

const LOG_FILE: &str = "tapeworks.log";

/// Command line: an engine name plus optional flags.
struct Args {
    kind: EngineKind,
    config: Option<PathBuf>,
    bpm: f32,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> EyreResult<Self> {
        let mut parsed = Args {
            kind: EngineKind::Nautilus,
            config: None,
            bpm: 120.0,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args.next().ok_or_else(|| eyre!("--config needs a path"))?;
                    parsed.config = Some(PathBuf::from(path));
                }
                "--bpm" => {
                    let value = args.next().ok_or_else(|| eyre!("--bpm needs a value"))?;
                    parsed.bpm = value
                        .parse()
                        .wrap_err_with(|| format!("invalid bpm {value:?}"))?;
                }
                name => {
                    parsed.kind = EngineKind::from_name(name).ok_or_else(|| {
                        eyre!("unknown engine {name:?} (databender, morphagene, nautilus, lubadh)")
                    })?;
                }
            }
        }
        Ok(parsed)
    }
}

fn init_logging() -> EyreResult<()> {
    let file = File::create(LOG_FILE).wrap_err("failed to create log file")?;
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .init();
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> EyreResult<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    let config: EngineConfig =
        serde_json::from_str(&text).wrap_err("config is not valid engine JSON")?;
    config.validate()?;
    Ok(config)
}

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    let args = Args::parse(std::env::args().skip(1))?;
    init_logging()?;
    let config = load_config(args.config.as_ref())?;

    Tapeworks::new(args.kind, config).bpm(args.bpm).run()
}
