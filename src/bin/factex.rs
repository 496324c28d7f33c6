use anyhow::{anyhow, Result};
use factex::registry::{FormatDetector, SledProfileStore};
use factex::types::FilingMetadata;
use factex::{Config, Orchestrator};
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let input = args
        .next()
        .ok_or_else(|| anyhow!("usage: factex <document> [ticker]"))?;
    let ticker = args.next().unwrap_or_else(|| "UNKNOWN".to_string());

    let config = Config::from_env()?;
    let bytes = std::fs::read(&input)?;

    let store = SledProfileStore::open(config.registry_path())?;
    let orchestrator = Orchestrator::new(FormatDetector::new(Arc::new(store)));

    let meta = FilingMetadata {
        source_name: Some(input),
        ..FilingMetadata::for_ticker(&ticker)
    };
    let result = orchestrator.extract_document(&bytes, None, &meta);

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
