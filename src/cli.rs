//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use catalog_fetch_core::DEFAULT_TIMEOUT_SECS;

/// Value of `--db` that selects a throwaway in-memory store.
pub const MEMORY_DB: &str = ":memory:";

/// Fetch catalog resources with persistent cookies and stored bearer tokens.
///
/// Redirects are followed manually so cookies set along the way are kept.
/// A 401 is retried with the token stored for the host, refreshing it once
/// when the server rejects it.
#[derive(Parser, Debug)]
#[command(name = "catalog-fetch")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Key-value store holding cookies and tokens (":memory:" for none)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Locale sent in accept-language (defaults to en-US)
    #[arg(long, global = true)]
    pub locale: Option<String>,

    /// Per-attempt request timeout in seconds (1-600)
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub timeout_secs: u64,

    /// Accept invalid TLS certificates (development servers only)
    #[arg(long, global = true)]
    pub insecure_dev: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// GET a URL, retrying a 401 with the stored token
    Get {
        /// Target URL
        url: String,

        /// Do not use stored tokens
        #[arg(long)]
        no_auth: bool,

        /// Include the response body in the output
        #[arg(long)]
        body: bool,
    },

    /// POST to a URL
    Post {
        /// Target URL
        url: String,

        /// JSON request body
        #[arg(long)]
        json: Option<String>,

        /// Include the response body in the output
        #[arg(long)]
        body: bool,
    },

    /// Manage stored tokens
    #[command(subcommand)]
    Token(TokenCommand),

    /// Delete all cookies and stored tokens
    Wipe,
}

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Store a token for the host of its authentication URL
    Set {
        /// Authentication document URL; its host keys the record
        #[arg(long)]
        authentication_url: String,

        #[arg(long)]
        access_token: String,

        #[arg(long)]
        refresh_token: Option<String>,

        /// Endpoint accepting refresh_token grants
        #[arg(long)]
        refresh_url: Option<String>,

        /// Authorization scheme (defaults to Bearer)
        #[arg(long)]
        token_type: Option<String>,
    },

    /// Show the token stored for a host, secrets redacted
    Show {
        /// Hostname, e.g. catalog.example.org
        hostname: String,
    },
}

impl Args {
    /// Whether `--db` selects the in-memory store.
    #[must_use]
    pub fn in_memory(&self) -> bool {
        self.db
            .as_deref()
            .is_some_and(|path| path.as_os_str() == MEMORY_DB)
    }
}
