//! `zapgate restart`: restart the instance and report the follow-up probe.

use anyhow::{Result, bail};
use tracing::info;

use super::Context;

pub async fn run(ctx: &Context, instance: Option<String>) -> Result<()> {
    let record = ctx.record().await?;
    let instance = Context::instance(instance, &record);
    let manager = ctx.session_manager(&record)?;

    let recheck = match manager.restart(&instance).await {
        Ok(recheck) => recheck,
        Err(e) => {
            manager.dispose();
            return Err(e.into());
        }
    };

    info!(
        delay_ms = ctx.config.session.restart_recheck_delay_ms,
        "Waiting for instance to come back"
    );
    let status = recheck.wait().await;
    manager.dispose();

    match status {
        Some(status) => {
            println!("{status}");
            Ok(())
        }
        None => bail!("status check after restart did not complete"),
    }
}
