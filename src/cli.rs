use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use sw_metadata::Capability;

#[derive(Parser)]
#[command(name = "shelfwise")]
#[command(author, version, about = "Book library metadata provider administration")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List registered metadata providers in failover order
    Providers {
        /// Only list enabled providers supporting this capability
        #[arg(long, value_enum)]
        capability: Option<CapabilityArg>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a health check against every provider
    Health {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search a provider for books
    Search {
        /// Provider id
        provider: String,

        /// Free-text query (title, author or ISBN)
        query: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch full metadata for one book from a provider
    Fetch {
        /// Provider id
        provider: String,

        /// Provider-specific book identifier
        external_id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Pull a provider's whole library
    Sync {
        /// Provider id
        provider: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Enable a provider
    Enable {
        /// Provider id
        provider: String,
    },

    /// Disable a provider
    Disable {
        /// Provider id
        provider: String,
    },

    /// Set a provider's priority (lower runs first)
    Priority {
        /// Provider id
        provider: String,

        /// New priority
        #[arg(allow_negative_numbers = true)]
        value: i32,
    },

    /// Show or reset a provider's circuit breaker
    Circuit {
        /// Provider id
        provider: String,

        /// Force the circuit closed
        #[arg(long)]
        reset: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CapabilityArg {
    Search,
    MetadataFetch,
    Sync,
}

impl From<CapabilityArg> for Capability {
    fn from(arg: CapabilityArg) -> Self {
        match arg {
            CapabilityArg::Search => Capability::Search,
            CapabilityArg::MetadataFetch => Capability::MetadataFetch,
            CapabilityArg::Sync => Capability::Sync,
        }
    }
}
