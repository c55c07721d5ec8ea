#![deny(dead_code)] // DO NOT REMOVE THIS EVER
use anyhow::{anyhow, Result};
use clap::Parser;
use futures_util::StreamExt;
use log::{debug, error, info, warn, LevelFilter};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

mod utils;

use gadu::gg::{Gg70Codec, ServerDiscovery};
use gadu::{ClientConfig, ContactType, GGClient, GGEvent, SessionState, Uin};

/// Service answering which server handles an account.
const APPMSG_URL: &str = "http://appmsg.gadu-gadu.pl/appsvc/appmsg_ver8.asp";
const APPMSG_CLIENT_VERSION: &str = "10.0.0.10450";
const LOOKUP_TIMEOUT_SECS: u64 = 10;

/// Command line arguments for gadu-cli
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "gadu-cli: a command-line Gadu-Gadu client.",
    long_about = "gadu-cli connects to the Gadu-Gadu network and prints session events.\n\n\
    Commands once connected:\n\
    /msg <uin> <text>          Send a message\n\
    /status <status> [text]    Change status (available, busy, invisible, dnd, ffc, offline)\n\
    /add <uin>                 Add a contact\n\
    /remove <uin>              Remove a contact\n\
    /quit                      Disconnect and exit"
)]
struct Args {
    /// Configuration file; defaults to the per-user config directory
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the log to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Explicit server as host:port, skipping discovery
    #[arg(short, long)]
    server: Option<String>,
}

enum Command {
    Message(Uin, String),
    Status(String, Option<String>),
    Add(Uin),
    Remove(Uin),
    Quit,
}

fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match name {
        "/msg" => {
            let (uin, text) = rest
                .split_once(' ')
                .ok_or_else(|| anyhow!("usage: /msg <uin> <text>"))?;
            Ok(Command::Message(uin.parse()?, text.trim().to_string()))
        }
        "/status" => {
            let (status, description) = match rest.split_once(' ') {
                Some((status, description)) => (status, Some(description.trim().to_string())),
                None => (rest, None),
            };
            if status.is_empty() {
                return Err(anyhow!("usage: /status <status> [description]"));
            }
            Ok(Command::Status(status.to_string(), description))
        }
        "/add" => Ok(Command::Add(rest.parse()?)),
        "/remove" => Ok(Command::Remove(rest.parse()?)),
        "/quit" => Ok(Command::Quit),
        _ => Err(anyhow!("unknown command: {}", name)),
    }
}

fn run_command(client: &GGClient, command: Command) -> Result<bool> {
    match command {
        Command::Message(uin, text) => {
            let seq = client.send_text(uin, &text)?;
            debug!("Sent message {} to {}", seq, uin);
        }
        Command::Status(name, description) => {
            let status = utils::parse_status(&name).ok_or_else(|| anyhow!("unknown status: {}", name))?;
            client.set_status(status, description.as_deref())?;
        }
        Command::Add(uin) => client.add_contact(uin, ContactType::Normal)?,
        Command::Remove(uin) => {
            if client.remove_contact(uin, None)?.is_none() {
                println!("* {} is not on the contact list", uin);
            }
        }
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

/// Server discovery through the appmsg HTTP service.
struct AppmsgDiscovery {
    http: reqwest::Client,
}

impl AppmsgDiscovery {
    fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(LOOKUP_TIMEOUT_SECS))
            .build()?;
        Ok(AppmsgDiscovery { http })
    }
}

#[async_trait::async_trait]
impl ServerDiscovery for AppmsgDiscovery {
    async fn resolve(&self, uin: Uin) -> Result<Option<IpAddr>> {
        debug!("Asking appmsg for the server of {}", uin);
        let response = self
            .http
            .get(APPMSG_URL)
            .query(&[
                ("fmnumber", uin.to_string()),
                ("fmt", "2".to_string()),
                ("lastmsg", "0".to_string()),
                ("version", APPMSG_CLIENT_VERSION.to_string()),
            ])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(anyhow!("appmsg answered {}: {}", status, body.trim()));
        }
        let server = parse_appmsg_reply(&body);
        if server.is_none() {
            warn!("No server in appmsg reply: {}", body.trim());
        }
        Ok(server)
    }
}

/// The first line reads `<code> <code> <host:port> <host>`; the host is
/// `notoperating` when the service has nothing to offer.
fn parse_appmsg_reply(body: &str) -> Option<IpAddr> {
    let line = body.lines().next()?;
    let server = line.split_whitespace().nth(2)?;
    let host = server.split(':').next()?;
    host.parse().ok()
}

fn print_event(event: &GGEvent) {
    match event {
        GGEvent::LoggedIn => println!("* Logged in"),
        GGEvent::LoginFailed => println!("* Login failed"),
        GGEvent::Disconnected(reason) => println!("* Disconnected: {}", reason),
        GGEvent::ConnectFailed(reason) => println!("* Connection failed: {}", reason),
        GGEvent::DiscoveryFailed(reason) => println!("* Server lookup failed: {}", reason),
        GGEvent::MessageReceived(message) => println!("{}", utils::format_message(message)),
        GGEvent::OwnMessageReceived(message) => println!("(sent elsewhere) {}", utils::format_message(message)),
        GGEvent::MessageAcknowledged(ack) => debug!("Message {} to {}: {:?}", ack.seq, ack.recipient, ack.status),
        GGEvent::StatusChanged(info) if info.description.is_empty() => {
            println!("* {} is now {:?}", info.uin, info.status)
        }
        GGEvent::StatusChanged(info) => {
            println!("* {} is now {:?} ({})", info.uin, info.status, info.description)
        }
        GGEvent::MultiloginSession(session) => {
            println!("* Also logged in from {} ({})", session.ip, session.client_name)
        }
        GGEvent::XmlSystemMessage(text) => println!("* System message: {}", text),
        other => debug!("Event: {:?}", other),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_file = args.log_file.as_ref().map(|path| path.to_string_lossy().into_owned());
    let level: LevelFilter = args
        .log_level
        .parse()
        .map_err(|_| anyhow!("unknown log level: {}", args.log_level))?;
    utils::setup_logging(log_file.as_deref(), level)?;

    let config_path = match args.config {
        Some(path) => path,
        None => ClientConfig::default_path()?,
    };
    let mut config = if config_path.exists() {
        ClientConfig::load(&config_path)?
    } else {
        info!("No config at {}, using environment only", config_path.display());
        ClientConfig::default()
    };
    config.apply_env()?;
    if args.server.is_some() {
        config.server = args.server;
    }
    config.validate()?;

    let client = GGClient::builder(config)
        .discovery(AppmsgDiscovery::new()?)
        .contact_list_codec(Gg70Codec)
        .build();

    let mut events = client.subscribe();
    client.connect()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                print_event(&event);
                let finished = matches!(
                    event,
                    GGEvent::LoginFailed
                        | GGEvent::Disconnected(_)
                        | GGEvent::ConnectFailed(_)
                        | GGEvent::DiscoveryFailed(_)
                );
                if finished {
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line).and_then(|command| run_command(&client, command)) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => eprintln!("! {}", e),
                }
            }
        }
    }

    if client.state() != SessionState::Idle {
        if let Err(e) = client.disconnect() {
            error!("Disconnect failed: {}", e);
        }
    }
    Ok(())
}
