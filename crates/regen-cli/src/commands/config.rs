use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use regen_core::reconstruct::config::BatchConfig;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Print or save the background/foreground/original batch template as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let toml_str = toml::to_string_pretty(&BatchConfig::template())?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Template batch config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}
