use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::info;

use character_stage::{
    AssetSource, FileAssetSource, GpuBackend, LoadIndicator, LoadOrchestrator, LoadPhase, Roster,
    SelectionCommand, SelectionCursor, SelectionEvent, StageConfig, TrackingBackend, WgpuBackend,
};

const FRAME_DELTA: f32 = 1.0 / 60.0;
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let config = match &options.config {
        Some(path) => StageConfig::load(path)?,
        None => StageConfig::default(),
    };
    let roster = match &options.roster {
        Some(path) => Roster::load(path)?,
        None => Roster::builtin(),
    };

    println!("Roster: {} entities", roster.len());
    for entity in roster.iter() {
        println!(
            " - [{}] {} ({})",
            entity.roster_tag(),
            entity.display_name,
            entity.theme_color
        );
    }

    let backend = create_backend(options.gpu);
    let source: Arc<dyn AssetSource> = Arc::new(FileAssetSource::new(&options.assets));
    let indicator = LoadIndicator::new();
    let mut orchestrator =
        LoadOrchestrator::new(roster, source, backend, &config).with_observer(indicator.clone());
    let mut cursor = SelectionCursor::new(orchestrator.roster().len());

    let index = cursor.pick(options.select).ok_or_else(|| {
        anyhow!(
            "--select {} is out of range for a roster of {}",
            options.select,
            orchestrator.roster().len()
        )
    })?;
    orchestrator.select_character(index)?;

    for key in &options.keys {
        let command = SelectionCommand::from_key_name(key)
            .ok_or_else(|| anyhow!("unknown key `{key}`; expected Left, Right or Enter"))?;
        match cursor.apply(command) {
            Some(SelectionEvent::Select(index)) => {
                orchestrator.select_character(index)?;
            }
            Some(SelectionEvent::Confirmed(index)) => {
                if let Some(entity) = orchestrator.roster().get(index) {
                    println!("Locked in: {}", entity.display_name);
                }
            }
            None => {}
        }
    }

    if !orchestrator.settle(SETTLE_TIMEOUT) {
        return Err(anyhow!(
            "model loads did not settle within {}s",
            SETTLE_TIMEOUT.as_secs()
        ));
    }
    for _ in 0..options.frames {
        orchestrator.tick(FRAME_DELTA);
    }
    info!("ran {} frames", options.frames);

    print_summary(&orchestrator, &indicator);
    Ok(())
}

fn create_backend(use_gpu: bool) -> Box<dyn GpuBackend> {
    if use_gpu {
        match WgpuBackend::headless() {
            Ok(backend) => {
                println!("GPU adapter: {}", backend.adapter_name());
                return Box::new(backend);
            }
            Err(err) => {
                eprintln!("{err:#}. Falling back to the tracking backend.");
            }
        }
    }
    Box::new(TrackingBackend::new())
}

fn print_summary(orchestrator: &LoadOrchestrator<Box<dyn GpuBackend>>, indicator: &LoadIndicator) {
    let state = orchestrator.state();
    if let Some(entity) = orchestrator.selected_entity() {
        println!(
            "Selected: {} ({}) [{}]",
            entity.display_name, entity.id, entity.theme_color
        );
        if let Some(profile) = &entity.profile {
            println!(
                "Profile: {} / {} / {} (power {})",
                profile.real_name,
                profile.company,
                profile.class,
                profile.total_power()
            );
        }
    }

    if let Some(model) = orchestrator.current_model() {
        let kind = match state.phase() {
            LoadPhase::AttachedPlaceholder => "placeholder",
            _ => "loaded",
        };
        println!(
            "Model: {kind} (meshes {}, clips {})",
            model.root.mesh_count(),
            model.clips.len()
        );
    }
    if let Some(animation) = state.current_animation() {
        println!(
            "Animation: {} at {:.2}s",
            animation.clip_name(),
            animation.time()
        );
    }

    let stage = orchestrator.stage();
    println!("Theme: {}", stage.theme().current());
    println!("Attached models: {}", stage.attached_count());
    println!("Reachable nodes: {}", stage.reachable_nodes());
    println!("Draw items: {}", stage.draw_list().len());
    println!("Particles: {}", stage.particles().positions().len());
    println!(
        "Loading indicator: {}",
        if indicator.is_visible() {
            "visible"
        } else {
            "hidden"
        }
    );
    let live = orchestrator.backend().live_resources();
    println!(
        "Live GPU resources: geometries={} textures={} materials={}",
        live.geometries, live.textures, live.materials
    );
}

#[derive(Debug)]
struct CliOptions {
    roster: Option<PathBuf>,
    assets: PathBuf,
    config: Option<PathBuf>,
    select: usize,
    keys: Vec<String>,
    frames: u32,
    gpu: bool,
}

const USAGE: &str = "Usage: character-stage [--roster FILE] [--assets DIR] [--config FILE] \
[--select N] [--keys K1,K2] [--frames N] [--gpu]";

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self {
            roster: None,
            assets: PathBuf::from("."),
            config: None,
            select: 0,
            keys: Vec::new(),
            frames: 0,
            gpu: false,
        };
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{flag} expects a value. {USAGE}"))
            };
            match arg.as_str() {
                "--roster" => options.roster = Some(PathBuf::from(value("--roster")?)),
                "--assets" => options.assets = PathBuf::from(value("--assets")?),
                "--config" => options.config = Some(PathBuf::from(value("--config")?)),
                "--select" => {
                    options.select = value("--select")?
                        .parse()
                        .context("--select expects an entity index")?;
                }
                "--keys" => {
                    options.keys = value("--keys")?
                        .split(',')
                        .map(str::trim)
                        .filter(|key| !key.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                "--frames" => {
                    options.frames = value("--frames")?
                        .parse()
                        .context("--frames expects a frame count")?;
                }
                "--gpu" => options.gpu = true,
                other => return Err(anyhow!("Unknown argument: {other}. {USAGE}")),
            }
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions> {
        CliOptions::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn defaults_select_the_first_entity() {
        let options = parse(&[]).unwrap();
        assert_eq!(options.select, 0);
        assert_eq!(options.assets, PathBuf::from("."));
        assert!(options.roster.is_none());
        assert!(!options.gpu);
    }

    #[test]
    fn parses_every_flag() {
        let options = parse(&[
            "--roster", "r.xml", "--assets", "models", "--config", "c.json", "--select", "3",
            "--keys", "Right, Left,Enter", "--frames", "12", "--gpu",
        ])
        .unwrap();
        assert_eq!(options.roster, Some(PathBuf::from("r.xml")));
        assert_eq!(options.select, 3);
        assert_eq!(options.keys, vec!["Right", "Left", "Enter"]);
        assert_eq!(options.frames, 12);
        assert!(options.gpu);
    }

    #[test]
    fn rejects_unknown_and_incomplete_flags() {
        assert!(parse(&["--fullscreen"]).is_err());
        assert!(parse(&["--select"]).is_err());
        assert!(parse(&["--select", "two"]).is_err());
    }
}
