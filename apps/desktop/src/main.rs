use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, Attachment, ChatClient, ChatError, ChatEvent, ClientEvent, DashboardTab,
    RenderedBody, Route, SessionPhase, SignupForm, TranscriptEntry,
};
use shared::domain::{GroupId, UserId};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chat-desktop", about = "Terminal chat client")]
struct Args {
    #[arg(long, global = true)]
    server_url: Option<String>,
    #[arg(long, global = true)]
    session_path: Option<PathBuf>,
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    Logout,
    Dashboard {
        #[arg(long, default_value = "all")]
        tab: DashboardTab,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Direct conversation with another user.
    Chat {
        #[arg(long)]
        user: i64,
        #[arg(long, default_value = "")]
        name: String,
    },
    Group {
        #[arg(long)]
        id: i64,
        #[arg(long, default_value = "")]
        name: String,
    },
    CreateGroup {
        #[arg(long)]
        name: String,
        #[arg(long = "member", required = true)]
        members: Vec<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref());
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(session_path) = args.session_path {
        settings.session_path = session_path;
    }

    info!(server_url = %settings.server_url, "desktop: starting");
    let client = ChatClient::from_settings(settings).await?;
    let mut client_events = client.subscribe_events();

    let outcome = run_command(&client, args.command).await;
    drain_client_events(&mut client_events);
    outcome
}

async fn run_command(client: &ChatClient, command: Command) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let session = client.auth().login(&email, &password).await?;
            println!(
                "Logged in as {} (user_id={})",
                session.user.name,
                session.user_id()
            );
        }
        Command::Register {
            name,
            email,
            password,
            confirm,
        } => {
            let form = SignupForm {
                name,
                email,
                password,
                confirm_password: confirm,
            };
            let session = client.auth().register(&form).await?;
            println!("Registered as user_id={}", session.user_id());
        }
        Command::Logout => {
            client.session().logout().await?;
            println!("Logged out");
        }
        Command::Dashboard { tab, search } => {
            require_login(client).await?;
            let data = client.dashboard().load().await?;
            let tabs = DashboardTab::ALL
                .iter()
                .map(|t| {
                    if *t == tab {
                        format!("[{t}]")
                    } else {
                        t.to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
            println!("{tabs}");
            let entries = data.entries(tab, &search);
            if entries.is_empty() {
                println!(
                    "{}",
                    if tab == DashboardTab::Groups {
                        "No groups found."
                    } else {
                        "No conversations."
                    }
                );
            }
            for entry in entries {
                match entry.route() {
                    Route::DirectChat { peer, .. } => {
                        println!("  {:<24} chat --user {peer}", entry.name())
                    }
                    Route::GroupChat { group, .. } => {
                        println!("  {:<24} group --id {group}", entry.name())
                    }
                    _ => {}
                }
            }
        }
        Command::Chat { user, name } => {
            require_login(client).await?;
            run_chat(
                client,
                Route::DirectChat {
                    peer: UserId(user),
                    peer_name: name,
                },
            )
            .await?;
        }
        Command::Group { id, name } => {
            require_login(client).await?;
            run_chat(
                client,
                Route::GroupChat {
                    group: GroupId(id),
                    group_name: name,
                },
            )
            .await?;
        }
        Command::CreateGroup { name, members } => {
            require_login(client).await?;
            let creator = client.groups();
            let mut draft = creator.draft().await?;
            draft.set_name(name);
            for member in members {
                if !draft.toggle(UserId(member)) {
                    eprintln!("skipping unknown contact {member}");
                }
            }
            creator.submit(&mut draft).await?;
        }
    }
    Ok(())
}

async fn require_login(client: &ChatClient) -> Result<()> {
    if client.session().initial_route().await == Route::Login {
        bail!("not logged in; run `login` first");
    }
    Ok(())
}

fn drain_client_events(events: &mut broadcast::Receiver<ClientEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            ClientEvent::Notice(message) => println!("{message}"),
            ClientEvent::Navigate(Route::Login) => {
                eprintln!("Session ended; run `login` to sign in again")
            }
            ClientEvent::Error(message) => eprintln!("error: {message}"),
            _ => {}
        }
    }
}

fn format_entry(entry: &TranscriptEntry, me: UserId) -> String {
    let who = if entry.is_own(me) {
        "me".to_string()
    } else {
        entry
            .message
            .sender_name
            .clone()
            .unwrap_or_else(|| format!("user {}", entry.message.sender))
    };
    let body = match entry.message.rendered() {
        RenderedBody::Text(text) => text,
        RenderedBody::Attachment(Attachment::Image { url }) => format!("[image] {url}"),
        RenderedBody::Attachment(Attachment::Download { url }) => format!("[download] {url}"),
    };
    format!("{who}: {body}")
}

async fn run_chat(client: &ChatClient, route: Route) -> Result<()> {
    let chat = client.chat_for(&route).await?;
    let me = chat.user_id();
    let mut events = chat.subscribe();

    chat.open()
        .await
        .with_context(|| format!("failed to open chat {}", chat.title()))?;

    println!("== {} (room {}) ==", chat.title(), chat.room());
    let history = chat.transcript().await;
    if history.is_empty() {
        println!("No messages yet. Start the conversation!");
    }
    for entry in &history {
        println!("{}", format_entry(entry, me));
    }
    println!("Type a message and press enter. /file <path> sends a file, /quit leaves.");

    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ChatEvent::EntryAppended { entry, .. } if !entry.is_own(me) => {
                    println!("{}", format_entry(&entry, me))
                }
                ChatEvent::Error(message) => eprintln!("error: {message}"),
                ChatEvent::PhaseChanged(SessionPhase::Reconnecting) => {
                    eprintln!("connection lost, reconnecting...")
                }
                ChatEvent::PhaseChanged(SessionPhase::Closed) => break,
                _ => {}
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end();
        if line == "/quit" {
            break;
        }
        if let Some(path) = line.strip_prefix("/file ") {
            if let Err(err) = chat.send_file(Path::new(path.trim())).await {
                eprintln!("{err:#}");
            }
            continue;
        }
        match chat.send_text(line).await {
            Ok(_) | Err(ChatError::EmptyMessage) => {}
            Err(err) => {
                eprintln!("{err}");
                if err == ChatError::Closed {
                    break;
                }
            }
        }
    }

    chat.close().await;
    printer.abort();
    info!(room = %chat.room(), "desktop: left chat");
    Ok(())
}
