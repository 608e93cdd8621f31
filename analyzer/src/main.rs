mod cli;

use log::info;

use emotion_analyzer::logging;

fn main() {
    logging::init();

    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let command = cli::parse(&args)?;
    info!("Running {command:?}");
    cli::run(command)
}
