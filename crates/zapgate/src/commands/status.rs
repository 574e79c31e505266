//! `zapgate status`: probe the instance once.

use anyhow::{Result, bail};

use super::Context;

pub async fn run(ctx: &Context, instance: Option<String>, format: &str) -> Result<()> {
    if !matches!(format, "text" | "json") {
        bail!("unknown format '{format}' (expected text or json)");
    }

    let record = ctx.record().await?;
    let instance = Context::instance(instance, &record);
    let manager = ctx.session_manager(&record)?;

    let result = manager.check_status(&instance).await;
    let session = manager.session();
    manager.dispose();
    let status = result?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else {
        println!("{status}");
    }
    Ok(())
}
