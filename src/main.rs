mod args;

use args::{Cli, Command, ThemeMode};
use clap::Parser;
use log::{debug, info};
use relaydesk_client::{
    ApiClient, ClientError, ConnectionState, DismissNotification, FileStore, Message,
    Notification, RoomSession, RoomUpdate, SubmitMessage, Theme,
};
use relaydesk_core::{Config, load_config, logging};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[actix::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.clone()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.global.log_level);
    if let Err(e) = logging::setup_logging(level) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }
    debug!("Loaded configuration: {:?}", config);

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if e.needs_login() {
                eprintln!("Run `relaydesk login --username <name>` first.");
            }
            if matches!(e, ClientError::RoomUnavailable { .. }) {
                eprintln!("Run `relaydesk rooms` to pick another room.");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &Config) -> Result<(), ClientError> {
    let store = Arc::new(FileStore::open(&config.storage.path)?);
    let api = ApiClient::new(&config.server, store.clone())?;

    match command {
        Command::Login { username, password } => {
            let login = api.login(&username, &password).await?;
            let name = login.user.map(|u| u.username).unwrap_or(username);
            println!("Logged in as {}.", name);
        }
        Command::Logout => {
            api.logout()?;
            println!("Logged out.");
        }
        Command::Rooms => {
            let rooms = api.rooms().await?;
            if rooms.is_empty() {
                println!("No rooms yet. Create one with `relaydesk create-room <name>`.");
            }
            for room in rooms {
                let description = room.description.as_deref().unwrap_or("");
                println!(
                    "{:<24} {:<32} {:>6} msgs  {}",
                    room.slug, room.name, room.message_count, description
                );
            }
        }
        Command::CreateRoom { name, description } => {
            let room = api.create_room(&name, description.as_deref()).await?;
            println!("Room created: {} ({})", room.name, room.slug);
        }
        Command::Chat { slug } => chat(config, &api, store, &slug).await?,
        Command::Theme { mode } => {
            let theme = match mode {
                None => store.ui_preferences().theme,
                Some(ThemeMode::Toggle) => store.toggle_theme()?,
                Some(ThemeMode::Light) => store.set_theme(Theme::Light)?,
                Some(ThemeMode::Dark) => store.set_theme(Theme::Dark)?,
            };
            println!("Theme: {}", theme_name(theme));
        }
    }
    Ok(())
}

async fn chat(
    config: &Config,
    api: &ApiClient,
    store: Arc<FileStore>,
    slug: &str,
) -> Result<(), ClientError> {
    let (tx, mut updates) = mpsc::unbounded_channel();
    let session = RoomSession::join(config, api, store, slug, Some(tx)).await?;

    println!("== {} ==", session.room.name);
    if let Some(description) = &session.room.description {
        println!("{}", description);
    }
    for message in &session.history {
        print_message(message);
    }
    println!("-- Type a message and press Enter. /quit leaves, /dismiss <id> hides a notice. --");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(update) => print_update(&update),
                None => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "/quit" {
                    break;
                }
                if let Some(id) = line.strip_prefix("/dismiss ") {
                    if !session.room_actor.send(DismissNotification(id.trim().to_string())).await? {
                        eprintln!("! No notification '{}'", id.trim());
                    }
                    continue;
                }
                if let Err(e) = session.room_actor.send(SubmitMessage(line.to_string())).await? {
                    eprintln!("! {}", e);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, leaving room");
                break;
            },
        }
    }

    session.leave().await
}

fn print_message(message: &Message) {
    let time = message.created_at.get(11..16).unwrap_or("");
    println!("[{:>5}] {}: {}", time, message.author(), message.content);
}

fn print_notification(notification: &Notification) {
    println!(
        "! [{:?}] {} (id {})",
        notification.level, notification.message, notification.id
    );
}

fn print_update(update: &RoomUpdate) {
    match update {
        RoomUpdate::MessageAppended(message) => print_message(message),
        RoomUpdate::ConnectionChanged(state) => println!("-- {} --", state_label(*state)),
        RoomUpdate::Reconnecting { attempt, delay } => {
            println!("-- reconnect attempt {} in {:.1}s --", attempt, delay.as_secs_f32())
        }
        RoomUpdate::Notified(notification) => print_notification(notification),
        RoomUpdate::HistoryLoaded { .. } | RoomUpdate::NotificationDismissed(_) => {}
    }
}

fn state_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Idle => "idle",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Connected => "connected",
        ConnectionState::Reconnecting => "reconnecting",
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Closed => "closed",
    }
}

fn theme_name(theme: Theme) -> &'static str {
    match theme {
        Theme::Dark => "dark",
        Theme::Light => "light",
    }
}
