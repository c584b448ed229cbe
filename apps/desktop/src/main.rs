use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use client_core::{
    config::{load_settings, load_settings_from},
    resolver, ConversationSession, SessionEvent,
};
use shared::domain::{Identity, Room, RoomId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Terminal chat client for marketplace conversations.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    member_id: i64,
    #[arg(long)]
    name: String,
    /// Overrides `server_url` from the settings file and environment.
    #[arg(long)]
    server_url: Option<String>,
    /// Scopes the room listing to one store.
    #[arg(long)]
    store_url: Option<String>,
    /// Room to open right after the directory loads.
    #[arg(long)]
    room: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
}

const HELP: &str = "commands: /rooms, /search <text>, /join <room id>, /open <address>, /leave, /read, /quit; anything else is sent to the open room";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => load_settings_from(path),
        None => load_settings(),
    };
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if args.store_url.is_some() {
        settings.store_url = args.store_url;
    }
    info!(server_url = %settings.server_url, "starting chat client");

    let identity = Identity::new(args.member_id, args.name);
    let session = ConversationSession::from_settings(identity, &settings)?;
    tokio::spawn(print_events(Arc::clone(&session)));

    match session.load_directory().await {
        Ok(rooms) => print_rooms(&rooms, session.identity()),
        Err(err) => warn!("room directory unavailable: {err}"),
    }
    if let Some(room) = args.room {
        if let Err(err) = session.select_room(RoomId::from(room)).await {
            println!("! {err}");
        }
    }
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/rooms", _) => print_rooms(&session.directory().rooms().await, session.identity()),
            ("/search", query) => {
                print_rooms(&session.search_rooms(query).await, session.identity())
            }
            ("/join", room) if !room.trim().is_empty() => {
                if let Err(err) = session.select_room(RoomId::from(room.trim())).await {
                    println!("! {err}");
                }
            }
            ("/open", address) if !address.trim().is_empty() => {
                if let Err(err) = session.select_address(address).await {
                    println!("! {err}");
                }
            }
            ("/leave", _) => session.leave_room().await,
            ("/read", _) => {
                if let Err(err) = session.mark_read().await {
                    println!("! {err}");
                }
            }
            (command, _) if command.starts_with('/') => println!("{HELP}"),
            _ => {
                if let Err(err) = session.send_message(line).await {
                    println!("! {err}");
                }
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

fn print_rooms(rooms: &[Room], identity: &Identity) {
    if rooms.is_empty() {
        println!("(no rooms)");
    }
    for room in rooms {
        println!(
            "  {:<32} {:<16} {}",
            room.room_id.as_str(),
            resolver::resolve(room, identity),
            room.last_message.as_deref().unwrap_or("")
        );
    }
}

async fn print_events(session: Arc<ConversationSession>) {
    let mut events = session.subscribe_events();
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event printer fell behind");
                continue;
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
        };
        match event {
            SessionEvent::RoomSelected(room_id) => println!("== {room_id}"),
            SessionEvent::MessageAppended(_) => {
                if let Some(last) = session.display_messages().await.last() {
                    print_message(last);
                }
            }
            SessionEvent::HistoryLoaded { .. } | SessionEvent::HistoryUnavailable { .. } => {
                for message in session.display_messages().await {
                    print_message(&message);
                }
            }
            SessionEvent::ConnectionStateChanged(state) => println!("-- connection {state:?}"),
            SessionEvent::DirectoryUpdated(_) => {}
            SessionEvent::Error(err) => println!("! {err}"),
        }
    }
}

fn print_message(message: &client_core::DisplayMessage) {
    let marker = match message.class {
        client_core::MessageClass::Admin => "[admin]",
        client_core::MessageClass::Sent => "[me]",
        client_core::MessageClass::Received => "",
    };
    println!(
        "{} {marker} {}: {}",
        message.formatted_date, message.message.sender_name, message.message.message
    );
}
