//! `zapgate logout`

use anyhow::Result;

use super::Context;

pub async fn run(ctx: &Context, instance: Option<String>) -> Result<()> {
    let record = ctx.record().await?;
    let instance = Context::instance(instance, &record);
    let manager = ctx.session_manager(&record)?;

    let result = manager.end_session(&instance).await;
    let status = manager.status();
    manager.dispose();
    result?;

    println!("{status}");
    Ok(())
}
