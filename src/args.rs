use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// RelayDesk - terminal client for RelayDesk chat rooms
#[derive(Parser, Debug)]
#[command(name = "relaydesk")]
#[command(version)]
#[command(about = "Chat in RelayDesk rooms from the terminal", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./relaydesk.toml when present)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level override (error, warn, info, debug, trace)
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store the session tokens
    Login {
        #[arg(short = 'u', long = "username")]
        username: String,

        #[arg(short = 'p', long = "password", env = "RELAYDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// List chat rooms
    Rooms,

    /// Create a chat room
    CreateRoom {
        name: String,

        #[arg(short = 'd', long = "description")]
        description: Option<String>,
    },

    /// Join a room and chat. Type `/quit` or press Ctrl-C to leave.
    Chat { slug: String },

    /// Show or change the UI theme
    Theme {
        #[arg(value_enum)]
        mode: Option<ThemeMode>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Light,
    Dark,
    Toggle,
}
