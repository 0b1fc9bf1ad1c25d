//! Command-line arguments.
//!
//! Key material is accepted from flags or the environment. Values are never
//! shown in `--help`, and parse failures name the offending setting only.

use std::path::PathBuf;

use cinder_core::{ConversationId, UserId};
use cinder_crypto::KeyConfig;
use clap::{Args, Parser, Subcommand};

use crate::error::CliError;

/// Cinder encrypted conversation CLI
#[derive(Parser)]
#[command(name = "cinder")]
#[command(about = "Encrypted conversations that self-destruct")]
#[command(version)]
pub struct Cli {
    /// Path to the redb database file
    #[arg(long, env = "CINDER_DB", default_value = "cinder.redb")]
    pub db: PathBuf,

    /// Key-encryption-keys
    #[command(flatten)]
    pub keys: KeyArgs,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Key-encryption-key settings.
#[derive(Args, Default)]
pub struct KeyArgs {
    /// Active KEK as 64 hex characters
    #[arg(long, env = "CINDER_KEK_HEX", hide_env_values = true)]
    pub kek_hex: Option<String>,

    /// Identifier recorded in envelopes sealed under the active KEK
    #[arg(long, env = "CINDER_KEK_ID")]
    pub kek_id: Option<String>,

    /// Retired KEK as `id=hex`, still accepted for opening old messages
    #[arg(
        long = "retired-kek",
        env = "CINDER_RETIRED_KEKS",
        value_delimiter = ',',
        hide_env_values = true
    )]
    pub retired_keks: Vec<String>,
}

impl KeyArgs {
    /// Build the key configuration.
    ///
    /// # Errors
    ///
    /// - `Config`: a retired entry is not of the form `id=hex`
    pub fn to_config(&self) -> Result<KeyConfig, CliError> {
        let mut retired = Vec::with_capacity(self.retired_keks.len());
        for (index, entry) in self.retired_keks.iter().enumerate() {
            let Some((id, hex_value)) = entry.split_once('=') else {
                return Err(CliError::Config(format!(
                    "retired key #{} must have the form id=hex",
                    index + 1
                )));
            };
            retired.push((id.trim().to_string(), hex_value.trim().to_string()));
        }

        Ok(KeyConfig { kek_hex: self.kek_hex.clone(), kek_id: self.kek_id.clone(), retired })
    }
}

/// Available commands.
///
/// Every command except `keygen` acts on behalf of the user given with
/// `--as` and prints one JSON document to stdout.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print a freshly generated KEK as hex
    Keygen,

    /// Create a conversation
    Create {
        /// Acting user
        #[arg(long = "as", value_name = "USER")]
        caller: UserId,

        /// Other members, comma separated
        #[arg(long, value_delimiter = ',')]
        members: Vec<UserId>,

        /// Conversation title
        #[arg(long)]
        title: Option<String>,
    },

    /// List the acting user's conversations
    Conversations {
        /// Acting user
        #[arg(long = "as", value_name = "USER")]
        caller: UserId,
    },

    /// Post a message
    Post {
        /// Acting user
        #[arg(long = "as", value_name = "USER")]
        caller: UserId,

        /// Target conversation
        #[arg(long)]
        conversation: ConversationId,

        /// Message text
        #[arg(long)]
        text: String,
    },

    /// List a conversation's messages
    List {
        /// Acting user
        #[arg(long = "as", value_name = "USER")]
        caller: UserId,

        /// Target conversation
        #[arg(long)]
        conversation: ConversationId,
    },

    /// Arm the conversation's autodestruct deadline
    Arm {
        /// Acting user
        #[arg(long = "as", value_name = "USER")]
        caller: UserId,

        /// Target conversation
        #[arg(long)]
        conversation: ConversationId,

        /// Delay in minutes: 1, 3 or 5
        #[arg(long, allow_negative_numbers = true)]
        minutes: i64,
    },

    /// Mark other members' messages as seen
    Seen {
        /// Acting user
        #[arg(long = "as", value_name = "USER")]
        caller: UserId,

        /// Target conversation
        #[arg(long)]
        conversation: ConversationId,
    },
}

impl Command {
    /// Name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Keygen => "keygen",
            Self::Create { .. } => "create",
            Self::Conversations { .. } => "conversations",
            Self::Post { .. } => "post",
            Self::List { .. } => "list",
            Self::Arm { .. } => "arm",
            Self::Seen { .. } => "seen",
        }
    }
}
