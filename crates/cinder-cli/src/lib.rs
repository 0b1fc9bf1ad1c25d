//! Cinder command-line front end.
//!
//! Wires the production [`SystemEnv`], a redb-backed store and a KEK ring
//! built from flags or environment variables into a
//! [`cinder_core::ConversationGateway`], then runs one command per process.

pub mod cli;
pub mod commands;
pub mod error;
pub mod system_env;

pub use cli::{Cli, Command, KeyArgs};
pub use commands::{execute, run};
pub use error::CliError;
pub use system_env::SystemEnv;
