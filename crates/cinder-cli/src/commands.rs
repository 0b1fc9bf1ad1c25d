//! Command execution.
//!
//! Each command prints exactly one JSON document followed by a newline.
//! Timestamps are RFC 3339 in UTC; identifiers use their `Display` form.

use std::io::Write;

use chrono::{DateTime, Utc};
use cinder_core::{
    Conversation, ConversationGateway, Environment, MessageView, RedbStorage, Storage,
};
use cinder_crypto::{KEK_SIZE, KeyProvider, KeyRing};
use serde_json::{Value, json};
use zeroize::Zeroizing;

use crate::{
    cli::{Cli, Command},
    error::CliError,
    system_env::SystemEnv,
};

/// Run a parsed command line against the production environment.
///
/// Keys are validated before the database is opened, so a bad configuration
/// never touches storage.
pub fn run(cli: &Cli, out: &mut impl Write) -> Result<(), CliError> {
    let env = SystemEnv::new();
    if matches!(cli.command, Command::Keygen) {
        return keygen(&env, out);
    }

    let config = cli.keys.to_config()?;
    let keys = KeyRing::from_config(&config)?;
    tracing::debug!(kek_id = %keys.current_id(), keys = keys.len(), "Loaded key ring");

    let storage = RedbStorage::open(&cli.db)?;
    let gateway = ConversationGateway::new(env, storage, keys);

    execute(&gateway, &cli.command, out)
}

/// Execute one command through `gateway`, writing its JSON result to `out`.
pub fn execute<E, S, K>(
    gateway: &ConversationGateway<E, S, K>,
    command: &Command,
    out: &mut impl Write,
) -> Result<(), CliError>
where
    E: Environment,
    S: Storage,
    K: KeyProvider,
{
    tracing::debug!(command = command.name(), "Running command");

    let result = match command {
        Command::Keygen => return keygen(gateway.env(), out),
        Command::Create { caller, members, title } => {
            let conversation =
                gateway.create_conversation(*caller, members.iter().copied(), title.as_deref())?;
            conversation_json(&conversation)
        },
        Command::Conversations { caller } => {
            let conversations = gateway.list_conversations(*caller)?;
            json!({
                "conversations": conversations.iter().map(conversation_json).collect::<Vec<_>>(),
            })
        },
        Command::Post { caller, conversation, text } => {
            let posted = gateway.post_message(*conversation, *caller, text)?;
            json!({
                "id": posted.id.to_string(),
                "conversation_id": conversation.to_string(),
                "sender": posted.sender.get(),
                "created_at": timestamp(posted.created_at),
            })
        },
        Command::List { caller, conversation } => {
            let views = gateway.list_messages(*conversation, *caller)?;
            json!({
                "conversation_id": conversation.to_string(),
                "messages": views.iter().map(message_json).collect::<Vec<_>>(),
            })
        },
        Command::Arm { caller, conversation, minutes } => {
            let armed = gateway.arm_autodestruct(*conversation, *caller, *minutes)?;
            json!({
                "conversation_id": armed.conversation_id.to_string(),
                "autodestruct_at": timestamp(armed.autodestruct_at),
            })
        },
        Command::Seen { caller, conversation } => {
            let marked = gateway.mark_seen(*conversation, *caller)?;
            json!({
                "conversation_id": conversation.to_string(),
                "marked": marked,
            })
        },
    };

    write_json(out, &result)
}

fn keygen(env: &impl Environment, out: &mut impl Write) -> Result<(), CliError> {
    let mut kek = Zeroizing::new([0u8; KEK_SIZE]);
    env.try_random_bytes(kek.as_mut_slice())
        .map_err(|err| CliError::Io(err.to_string()))?;
    // Bypasses `Value` so `encoded` is the only copy.
    let encoded = Zeroizing::new(hex::encode(kek.as_slice()));

    writeln!(out, "{{\"kek_hex\":\"{}\"}}", encoded.as_str())?;
    Ok(())
}

fn conversation_json(conversation: &Conversation) -> Value {
    json!({
        "id": conversation.id().to_string(),
        "title": conversation.title(),
        "members": conversation.members().iter().map(|m| m.get()).collect::<Vec<_>>(),
        "created_at": timestamp(conversation.created_at()),
        "autodestruct_at": conversation.autodestruct_at().map(timestamp),
    })
}

fn message_json(view: &MessageView) -> Value {
    json!({
        "id": view.id.to_string(),
        "sender": view.sender.get(),
        "created_at": timestamp(view.created_at),
        "text": view.text(),
        "readable": view.is_readable(),
        "seen_by": view.seen_by.iter().map(|u| u.get()).collect::<Vec<_>>(),
    })
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

fn write_json(out: &mut impl Write, value: &Value) -> Result<(), CliError> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
