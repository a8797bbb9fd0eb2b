// src/main.rs

use statecraft::config::{default_config_path, load_and_validate, load_or_default};
use statecraft::{cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("statecraft error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    // An explicit --config must exist; the default one is optional.
    let cfg = match &args.config {
        Some(path) => load_and_validate(path)?,
        None => load_or_default(default_config_path())?,
    };
    logging::init_logging(args.log_level, cfg.logging.level)?;
    run(args, cfg).await
}
