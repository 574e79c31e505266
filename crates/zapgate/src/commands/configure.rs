//! `zapgate configure`: edit the stored connection record.

use anyhow::{Context as _, Result, bail};
use tracing::info;

use zapgate::credential::{can_edit_message_key, redact};
use zapgate::store::ConfigStore;

use super::Context;

pub async fn run(
    ctx: &Context,
    base_url: Option<String>,
    api_key: Option<String>,
    instance: Option<String>,
) -> Result<()> {
    let mut record = ctx.record().await?;
    let before = record.clone();

    if let Some(key) = api_key {
        if key != record.api_key && !can_edit_message_key(ctx.role) {
            bail!("role '{}' may not change the client API key", ctx.role);
        }
        record.api_key = key;
    }
    if let Some(url) = base_url {
        record.base_url = url.trim().trim_end_matches('/').to_string();
    }
    if let Some(instance) = instance {
        record.instance = instance.trim().to_string();
    }

    if record != before {
        ctx.store
            .save(&record)
            .await
            .context("failed to save WhatsApp settings")?;
        info!(path = %ctx.store_path().display(), "Saved WhatsApp settings");
    }

    println!("base_url: {}", record.base_url);
    println!("instance: {}", record.instance);
    println!("api_key:  {}", redact(&record.api_key));
    if let Some(at) = record.last_connected {
        println!("last connected: {}", at.to_rfc3339());
    }
    Ok(())
}
