//! `zapgate connect`: request a QR code and wait for pairing.

use std::time::Duration;

use anyhow::{Result, bail};
use tracing::info;

use zapgate::session::{SessionManager, SessionStatus};

use super::Context;

pub async fn run(ctx: &Context, instance: Option<String>, poll_seconds: u64) -> Result<()> {
    let record = ctx.record().await?;
    let instance = Context::instance(instance, &record);
    let manager = ctx.session_manager(&record)?;

    let result = wait_for_pairing(&manager, &instance, poll_seconds).await;
    manager.dispose();
    result
}

async fn wait_for_pairing(
    manager: &SessionManager,
    instance: &str,
    poll_seconds: u64,
) -> Result<()> {
    let session = manager.begin_connect(instance).await?;
    if let Some(qr) = session.qr_payload() {
        println!("{qr}");
    }

    let poll = Duration::from_secs(poll_seconds.max(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => bail!("interrupted while waiting for pairing"),
            _ = tokio::time::sleep(poll) => {}
        }

        // The QR countdown may have expired while sleeping.
        if manager.status() == SessionStatus::Error {
            bail!(failure(manager));
        }

        match manager.check_status(instance).await? {
            SessionStatus::Connected => {
                println!("connected");
                return Ok(());
            }
            SessionStatus::Connecting => {
                if let Some(left) = manager.remaining_seconds() {
                    info!(instance = %instance, remaining = left, "Waiting for QR scan");
                }
            }
            SessionStatus::Error => bail!(failure(manager)),
            SessionStatus::Disconnected => {
                bail!("instance '{instance}' disconnected before pairing completed")
            }
        }
    }
}

fn failure(manager: &SessionManager) -> String {
    manager
        .session()
        .error_message()
        .unwrap_or("connection failed")
        .to_string()
}
