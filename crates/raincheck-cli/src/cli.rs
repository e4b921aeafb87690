//! CLI argument definitions for raincheck.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::client::DEFAULT_SERVER;

/// raincheck -- AI code review from the terminal.
#[derive(Parser)]
#[command(
    name = "raincheck",
    version,
    about = "raincheck -- AI code review from the terminal",
    long_about = "Stores your raincheck API key in an encrypted local vault and sends \
                  source files to the raincheck server for review."
)]
pub struct Cli {
    /// Base URL of the raincheck server.
    #[arg(long, global = true, env = "RAINCHECK_SERVER", default_value = DEFAULT_SERVER)]
    pub server: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store an API key in the local vault.
    Login {
        /// The key shown on your raincheck dashboard.
        apikey: String,
    },

    /// Remove the stored API key.
    Logout,

    /// Show whether an API key is stored and usable.
    Status,

    /// Review code.
    Review {
        #[command(subcommand)]
        target: ReviewTarget,
    },
}

#[derive(Subcommand)]
pub enum ReviewTarget {
    /// Review a single file.
    File {
        /// Path of the file to send.
        path: PathBuf,
    },
}
