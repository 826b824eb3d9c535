use anyhow::{Result, bail};

use crate::Context;
use crate::paths;
use crate::schema::PostinstallConfig;
use crate::ui;

/// Print the effective configuration (file merged over defaults)
pub fn show(_ctx: &Context) -> Result<()> {
    let (config, path) = PostinstallConfig::load()?;
    ui::header("Configuration");
    if path.exists() {
        ui::kv("File", &path.display().to_string());
    } else {
        ui::kv("File", &format!("{} (not found, using defaults)", path.display()));
    }
    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}

/// Write the default configuration file
pub fn init(ctx: &Context, force: bool) -> Result<()> {
    let path = paths::config_file()?;
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    PostinstallConfig::with_defaults().save_to(&path)?;
    if !ctx.quiet {
        ui::success(&format!("Wrote {}", path.display()));
    }
    Ok(())
}
