use luna_chat::config::{self, ClientConfig, URL_ENV};
use luna_chat::render::{NO_THREADS_PLACEHOLDER, THREADS_ERROR_PLACEHOLDER};
use luna_chat::{
    telemetry, ClientError, Completion, HttpBackend, Request, SessionClient, Side, Surface,
    ThreadsView,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

const HELP: &str = "\
Commands:
  /new           start a new thread
  /threads       reload saved threads
  /open <n|id>   open a saved thread by number or id
  /help          show this help
  /quit          exit
Anything else is sent as a message.";

const RIGHT_COLUMN: usize = 72;

// --- Terminal Surface ---

/// Formats one chat block; an empty reply still gets a visible line.
fn block_lines(side: Side, text: &str) -> Vec<String> {
    let lines: Vec<&str> = if text.is_empty() {
        vec!["(empty)"]
    } else {
        text.lines().collect()
    };
    lines
        .into_iter()
        .map(|line| match side {
            Side::Right => format!("{:>width$}", format!("{} <", line), width = RIGHT_COLUMN),
            Side::Left => format!("> {}", line),
        })
        .collect()
}

struct TerminalSurface;

impl Surface for TerminalSurface {
    fn append_block(&mut self, side: Side, text: &str) {
        for line in block_lines(side, text) {
            println!("{}", line);
        }
    }

    fn clear_blocks(&mut self) {
        // Clear screen and home the cursor.
        print!("\x1B[2J\x1B[H");
    }

    fn set_token_usage(&mut self, label: &str) {
        println!("[{}]", label);
    }

    fn clear_input(&mut self) {}

    fn notify(&mut self, message: &str) {
        eprintln!("!! {}", message);
    }

    fn show_threads(&mut self, view: ThreadsView<'_>) {
        match view {
            ThreadsView::Entries(entries) => {
                println!("Saved threads:");
                for entry in entries {
                    println!("  {}", entry.label);
                }
            }
            ThreadsView::Empty => println!("{}", NO_THREADS_PLACEHOLDER),
            ThreadsView::LoadError => println!("{}", THREADS_ERROR_PLACEHOLDER),
        }
    }
}

// --- Input Handling ---

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Send(&'a str),
    NewThread,
    Threads,
    Open(&'a str),
    Help,
    Quit,
    Nothing,
}

fn parse_command(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Nothing;
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Send(line);
    };
    let (name, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    match name {
        "new" => Command::NewThread,
        "threads" => Command::Threads,
        "open" => Command::Open(arg.trim()),
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Send(line),
    }
}

fn spawn_request(tx: &mpsc::UnboundedSender<Completion>, request: Request) {
    let tx = tx.clone();
    tokio::spawn(async move {
        // The receiver only goes away on shutdown.
        let _ = tx.send(request.await);
    });
}

async fn run() -> Result<(), ClientError> {
    let config = ClientConfig::load_or_initialize(&config::default_config_path()?)?
        .with_url_override(std::env::var(URL_ENV).ok());
    let _guard = telemetry::init(&config)?;

    let backend = Arc::new(HttpBackend::from_config(&config)?);
    info!(base_url = %backend.base_url(), "Starting chat session");
    println!("Connected to {}. Type /help for commands.", backend.base_url());

    let mut client = SessionClient::new(backend, TerminalSurface);
    let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();
    spawn_request(&tx, client.load_saved_threads());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Command::Send(text) => match client.send_message(text) {
                        Ok(request) => spawn_request(&tx, request),
                        Err(e) => debug!("Ignoring input: {}", e),
                    },
                    Command::NewThread => client.start_new_thread(),
                    Command::Threads => spawn_request(&tx, client.load_saved_threads()),
                    Command::Open(selector) => match client.select_thread(selector) {
                        Some(request) => spawn_request(&tx, request),
                        None => client.surface_mut().notify(&format!("No saved thread '{}'", selector)),
                    },
                    Command::Help => println!("{}", HELP),
                    Command::Quit => break,
                    Command::Nothing => {}
                }
            }
            Some(completion) = rx.recv() => {
                // Failures are already surfaced and logged by the client.
                if let Err(e) = client.apply(completion) {
                    debug!(kind = ?e.kind(), "Operation failed");
                }
            }
        }
    }

    info!("Chat session closed");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("luna-chat: {}", e);
        std::process::exit(1);
    }
}
