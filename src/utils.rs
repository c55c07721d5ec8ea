use anyhow::Result;
use chrono::{DateTime, Local};
use log::{LevelFilter, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

use gadu::models::{ReceivedMessage, Status};

pub struct SimpleLogger {
    log_file: Option<Mutex<File>>,
}

impl SimpleLogger {
    pub fn new(log_file_path: Option<&str>) -> Result<Self> {
        let log_file = match log_file_path {
            Some(path) => Some(Mutex::new(OpenOptions::new().create(true).append(true).open(path)?)),
            None => None,
        };

        Ok(SimpleLogger { log_file })
    }
}

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now: DateTime<Local> = Local::now();
            let log_message = format!(
                "[{}] {} [{}:{}] {}\n",
                now.format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            );

            match &self.log_file {
                Some(file) => {
                    if let Ok(mut file) = file.lock() {
                        let _ = file.write_all(log_message.as_bytes());
                    }
                }
                // stderr keeps the log out of the chat output
                None => eprint!("{}", log_message),
            }
        }
    }

    fn flush(&self) {
        match &self.log_file {
            Some(file) => {
                if let Ok(mut file) = file.lock() {
                    let _ = file.flush();
                }
            }
            None => {
                let _ = std::io::stderr().flush();
            }
        }
    }
}

pub fn setup_logging(log_file: Option<&str>, level: LevelFilter) -> Result<()> {
    let logger = SimpleLogger::new(log_file)?;
    log::set_boxed_logger(Box::new(logger)).map(|()| log::set_max_level(level))?;

    log::info!("Logging initialized at level: {}", level);
    log::info!("{} version {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    Ok(())
}

/// One line for an incoming message, e.g. `[12:30:01] 123456: hello`.
pub fn format_message(message: &ReceivedMessage) -> String {
    let time: DateTime<Local> = message.timestamp.with_timezone(&Local);
    match &message.conference {
        Some(members) if !members.is_empty() => {
            let others: Vec<String> = members.iter().map(|uin| uin.to_string()).collect();
            format!(
                "[{}] {} (conference with {}): {}",
                time.format("%H:%M:%S"),
                message.sender,
                others.join(", "),
                message.plain
            )
        }
        _ => format!("[{}] {}: {}", time.format("%H:%M:%S"), message.sender, message.plain),
    }
}

/// Parse a status name typed on the command line.
pub fn parse_status(name: &str) -> Option<Status> {
    match name.to_ascii_lowercase().as_str() {
        "available" | "online" => Some(Status::Available),
        "busy" | "away" => Some(Status::Busy),
        "invisible" => Some(Status::Invisible),
        "dnd" => Some(Status::DoNotDisturb),
        "ffc" | "chatty" => Some(Status::FreeForChat),
        "offline" => Some(Status::NotAvailable),
        _ => None,
    }
}
