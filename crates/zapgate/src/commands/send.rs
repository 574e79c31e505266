//! `zapgate send`

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use zapgate::dispatch::{MessageDispatcher, OutboundMessage};

use super::Context;

pub struct SendArgs {
    pub to: String,
    /// Without text, one message is sent per line read from stdin.
    pub text: Option<String>,
    pub delay_ms: Option<u64>,
    pub link_preview: bool,
    pub instance: Option<String>,
}

pub async fn run(ctx: &Context, args: SendArgs) -> Result<()> {
    let record = ctx.record().await?;
    let instance = Context::instance(args.instance, &record);
    let credential = ctx.message_key(&record);

    let dispatcher = MessageDispatcher::new(ctx.gateway(&record)?, ctx.config.dispatch.clone());
    let mut message = dispatcher.compose(args.to, args.text.clone().unwrap_or_default());
    if let Some(delay) = args.delay_ms {
        message = message.with_delay(delay);
    }
    if args.link_preview {
        message = message.with_link_preview(true);
    }

    if args.text.is_some() {
        return send_one(&dispatcher, &instance, &credential, &mut message).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        message.body = line;
        send_one(&dispatcher, &instance, &credential, &mut message).await?;
    }
    Ok(())
}

/// Send the composed message, then clear its body for the next one.
async fn send_one(
    dispatcher: &MessageDispatcher,
    instance: &str,
    credential: &str,
    message: &mut OutboundMessage,
) -> Result<()> {
    let receipt = dispatcher.send(instance, credential, message).await?;
    message.clear_body();
    println!(
        "sent to {} ({})",
        receipt.recipient,
        receipt.message_id.as_deref().unwrap_or("no message id")
    );
    Ok(())
}
