pub mod describe;
pub mod mixed;
pub mod ols;

use anyhow::{bail, Result};
use multilm_data::Frame;

/// Apply `--rename OLD=NEW` arguments to a frame.
pub fn apply_renames(frame: &mut Frame, renames: &[String]) -> Result<()> {
    for spec in renames {
        let (old, new) = spec
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("--rename expects OLD=NEW, got '{}'", spec))?;
        let (old, new) = (old.trim(), new.trim());
        if old.is_empty() || new.is_empty() {
            bail!("--rename expects OLD=NEW, got '{}'", spec);
        }
        frame.rename_column(old, new)?;
        tracing::info!("Renamed column '{}' to '{}'", old, new);
    }
    Ok(())
}
