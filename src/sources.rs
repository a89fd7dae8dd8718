use anyhow::Result;

use crate::adapter::Adapter;
use crate::config::Config;
use crate::ingest::ADAPTER_ORDER;

/// Print every adapter with its enablement, target, and whether its
/// configuration prerequisites are met.
pub fn list_sources(config: &Config) -> Result<()> {
    println!("{:<16} {:<10} {:>8}   READY", "ADAPTER", "ENABLED", "TARGET");

    for platform in ADAPTER_ORDER {
        let adapter = Adapter::from_config(platform, config)?;
        let ready = match adapter.missing_prerequisite() {
            Some(missing) => format!("no (missing {})", missing),
            None => "yes".to_string(),
        };
        println!(
            "{:<16} {:<10} {:>8}   {}",
            platform.key(),
            config.sources.enabled(platform),
            config.sources.target(platform),
            ready
        );
    }

    Ok(())
}
