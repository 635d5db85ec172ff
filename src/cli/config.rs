use eyre::{Context, Result};

use super::CommonOpts;

pub async fn read_and_print(opts: &CommonOpts) -> Result<()> {
    let config = opts.load().await?;
    let yaml = serde_yaml::to_string(&config).wrap_err("Failed to serialise config")?;

    print!("{yaml}");
    Ok(())
}
