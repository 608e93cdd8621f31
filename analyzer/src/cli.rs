use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use emotion_analyzer::config::{self, AnalyzerConfig};
use emotion_analyzer::payload::decode_data_url;
use emotion_analyzer::{Analyzer, PredictClient, host};

const USAGE: &str = "Usage: emotion-analyzer <command>\n\n\
Commands:\n  \
analyze <image>         Upload an image and print the detected emotion\n  \
capture [--keep <path>] Capture a camera frame and analyze it\n  \
health                  Check the prediction API\n  \
config                  Print the effective configuration\n  \
config init             Write a default config file\n  \
help                    Show this message";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Analyze { image: PathBuf },
    Capture { keep: Option<PathBuf> },
    Health,
    ShowConfig,
    InitConfig,
    Help,
}

pub fn parse(args: &[String]) -> Result<Command> {
    match args.get(1).map(String::as_str) {
        Some("analyze") => match args.get(2) {
            Some(path) if args.len() == 3 => Ok(Command::Analyze {
                image: PathBuf::from(path),
            }),
            _ => bail!("analyze takes exactly one image path\n\n{USAGE}"),
        },
        Some("capture") => match &args[2..] {
            [] => Ok(Command::Capture { keep: None }),
            [flag, path] if flag == "--keep" => Ok(Command::Capture {
                keep: Some(PathBuf::from(path)),
            }),
            _ => bail!("capture accepts only `--keep <path>`\n\n{USAGE}"),
        },
        Some("health") => Ok(Command::Health),
        Some("config") => match args.get(2).map(String::as_str) {
            None => Ok(Command::ShowConfig),
            Some("init") => Ok(Command::InitConfig),
            Some(other) => bail!("unknown config subcommand `{other}`\n\n{USAGE}"),
        },
        None | Some("help") | Some("--help") | Some("-h") => Ok(Command::Help),
        Some(other) => bail!("unknown command `{other}`\n\n{USAGE}"),
    }
}

pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Help => {
            println!("{USAGE}");
            Ok(())
        }
        Command::ShowConfig => {
            let config = AnalyzerConfig::load()?;
            println!("# {}", config::config_path()?.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!("# resolved api base: {}", config.resolve_api_base()?);
            Ok(())
        }
        Command::InitConfig => {
            let path = config::config_path()?;
            if path.exists() {
                bail!("{} already exists", path.display());
            }
            AnalyzerConfig::default().save_to(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        Command::Health => {
            let config = AnalyzerConfig::load()?;
            let client = PredictClient::new(config.resolve_api_base()?, config.request_timeout())?;
            let health = client.health()?;
            println!("{}: {}", client.base_url(), health.status);
            if let Some(model_path) = health.model_path {
                println!("model: {model_path}");
            }
            Ok(())
        }
        Command::Analyze { image } => {
            let analyzer = build_analyzer()?;
            analyzer.upload_file(&image)?;
            print_analysis(&analyzer)
        }
        Command::Capture { keep } => {
            let analyzer = build_analyzer()?;
            analyzer.start_camera()?;
            let captured = analyzer.capture_photo();
            analyzer.stop_camera();
            captured?;

            if let Some(path) = keep {
                let image = analyzer
                    .selected_image()
                    .context("capture produced no image")?;
                let blob = decode_data_url(image.payload.as_str())?;
                fs::write(&path, blob.bytes)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Saved capture to {}", path.display());
            }
            print_analysis(&analyzer)
        }
    }
}

fn build_analyzer() -> Result<Analyzer> {
    let config = AnalyzerConfig::load()?;
    let platform = host::native_platform(&config);
    Ok(Analyzer::new(config, platform)?)
}

fn print_analysis(analyzer: &Analyzer) -> Result<()> {
    let display = analyzer.analyze()?.display();
    println!("{} {}", display.emoji, display.label);
    println!("confidence: {}", display.confidence);
    Ok(())
}
