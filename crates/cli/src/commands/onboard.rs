//! `siteforge onboard` — write a starter config file.

use anyhow::Context;
use siteforge_config::AppConfig;

pub fn run() -> anyhow::Result<()> {
    let path = AppConfig::default_path();
    AppConfig::write_starter(&path)
        .with_context(|| format!("could not write starter config to {}", path.display()))?;

    println!("Wrote starter config to {}", path.display());
    println!("Set your API keys before starting the gateway:");
    println!("  api_key             — reasoning backend key (or SITEFORGE_API_KEY)");
    println!("  sandbox.api_key     — sandbox service key (or SITEFORGE_SANDBOX_API_KEY)");
    Ok(())
}
