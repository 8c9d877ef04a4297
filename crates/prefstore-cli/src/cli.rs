use clap::{Parser, Subcommand, ValueEnum};

/// Command line access to a prefstore data file.
#[derive(Parser, Debug)]
#[command(
    name = "prefstore",
    about = "Typed key-value store with optional transparent encryption",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Store a value under a key, replacing any previous value.
    Push {
        key: String,
        value: String,
        /// How to interpret the value.
        #[arg(long, value_enum, default_value_t = Kind::String)]
        kind: Kind,
    },
    /// Print the value stored under a key.
    Pull {
        key: String,
        #[arg(long, value_enum, default_value_t = Kind::String)]
        kind: Kind,
        /// Printed when the key is absent instead of failing.
        #[arg(long)]
        default: Option<String>,
    },
    /// Exit successfully and print true if the key is present.
    Exists { key: String },
    /// Delete a key.
    Remove { key: String },
    /// Dump every entry as decrypted text.
    Raw,
    /// Delete every entry.
    Clear,
    /// Round-trip a sample value through the configured store.
    Health,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version and exit.
    Version,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

/// Value types reachable from the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Int,
    Long,
    Float,
    Double,
    String,
    Bigint,
    /// Base64 on input and output.
    Bytes,
    Json,
}
