//! `zapgate sign`: send a contract signature link.

use anyhow::Result;

use zapgate::dispatch::MessageDispatcher;
use zapgate::signature::{ContractInvite, send_contract_for_signature};

use super::Context;

pub async fn run(ctx: &Context, invite: ContractInvite) -> Result<()> {
    let record = ctx.record().await?;
    let dispatcher = MessageDispatcher::new(ctx.gateway(&record)?, ctx.config.dispatch.clone());

    let receipt = send_contract_for_signature(
        ctx.store.as_ref(),
        &dispatcher,
        &ctx.policy(),
        ctx.role,
        &ctx.config.signature,
        &invite,
    )
    .await?;
    println!("signature link sent to {}", receipt.recipient);
    Ok(())
}
