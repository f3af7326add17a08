mod app;
mod commands;
mod controller;
mod events;
mod posts;
mod ui;

use std::{io, path::PathBuf, time::Duration};

use app::App;
use clap::Parser;
use commands::{Command, HELP};
use controller::{ControlCommand, ControlEvent, NodeController, NodeRequest};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use events::TuiEvent;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::UnboundedSender;
use tracing_subscriber::EnvFilter;

/// Terminal explorer for a postchain node.
#[derive(Parser, Debug)]
#[command(name = "pcx", version, about = "Browse posts and drive a postchain node")]
struct Cli {
    /// Node to explore.
    #[arg(short, long, default_value = "http://127.0.0.1:8000", env = "PC_NODE")]
    node: String,

    /// Seconds between polls of the node.
    #[arg(long, default_value_t = 3, env = "PCX_POLL_INTERVAL")]
    poll_interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Redirect all logs to a file so they never bleed onto the TUI screen.
    let log_path = pcx_log_path();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pc_tui=info".parse()?))
        .with_writer(log_file)
        .with_ansi(false)
        .init();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_tui(&mut terminal, cli).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_tui(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    cli: Cli,
) -> anyhow::Result<()> {
    let mut app = App::new(cli.node.clone());
    let tick_rate = Duration::from_millis(200);
    let poll_every = Duration::from_secs(cli.poll_interval.max(1));

    let controller = NodeController::spawn(cli.node, poll_every);
    let cmd_tx = controller.cmd_tx;
    let mut event_rx = controller.event_rx;

    app.push_traffic(format!("Connecting to {}…", app.node));

    loop {
        terminal.draw(|f| ui::draw(f, &app))?;

        // Drain controller events (non-blocking).
        while let Ok(ctrl_ev) = event_rx.try_recv() {
            handle_controller_event(&mut app, ctrl_ev);
        }

        match events::next_event(tick_rate)? {
            TuiEvent::Key(key) => {
                // Ctrl-C always quits.
                if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
                    break;
                }

                match key.code {
                    KeyCode::Enter => {
                        let raw = app.input.trim().to_string();
                        app.input.clear();
                        app.reset_history_nav();
                        app.clear_output();
                        if !raw.is_empty() {
                            app.push_history(raw.clone());
                        }
                        execute_command(&mut app, &cmd_tx, &raw);
                    }
                    KeyCode::Backspace => {
                        app.input.pop();
                    }
                    KeyCode::Tab => app.next_view(),
                    // ↑/↓ navigate command history in the input prompt.
                    KeyCode::Up => app.history_prev(),
                    KeyCode::Down => app.history_next(),
                    KeyCode::PageUp => app.scroll_up(),
                    KeyCode::PageDown => app.scroll_down(),
                    KeyCode::Char(c) => {
                        // Typing a character exits history navigation.
                        app.reset_history_nav();
                        app.input.push(c);
                    }
                    _ => {}
                }
            }
            TuiEvent::Resize | TuiEvent::Tick => {}
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Parse and execute a slash command entered by the user.
fn execute_command(app: &mut App, cmd_tx: &UnboundedSender<ControlCommand>, raw: &str) {
    let command = match commands::parse(raw) {
        Ok(command) => command,
        Err(usage) => {
            app.set_output(usage);
            return;
        }
    };

    let control = match command {
        Command::Nothing => None,
        Command::Post { author, content } => {
            app.push_traffic(format!("Posting as {author}…"));
            Some(ControlCommand::Request(NodeRequest::Post { author, content }))
        }
        Command::Mine => {
            app.push_traffic("Mining pending posts…");
            app.set_output("mining… this can take a while at high difficulty");
            Some(ControlCommand::Request(NodeRequest::Mine))
        }
        Command::Sync => {
            app.push_traffic("Running consensus…");
            Some(ControlCommand::Request(NodeRequest::Sync))
        }
        Command::Register(bootstrap) => {
            app.push_traffic(format!("Registering with {bootstrap}…"));
            Some(ControlCommand::Request(NodeRequest::Register(bootstrap)))
        }
        Command::SwitchNode(address) => {
            app.push_traffic(format!("Switching to {address}…"));
            Some(ControlCommand::SwitchNode(address))
        }
        Command::Refresh => Some(ControlCommand::Refresh),
        Command::View(view) => {
            app.set_view(view);
            None
        }
        Command::Help => {
            app.set_view(commands::View::Traffic);
            for line in HELP {
                app.push_traffic(*line);
            }
            None
        }
        Command::Quit => {
            app.should_quit = true;
            None
        }
    };

    if let Some(control) = control {
        if cmd_tx.send(control).is_err() {
            app.set_output("error: controller stopped");
        }
    }
}

/// Handle events arriving from the controller task.
fn handle_controller_event(app: &mut App, ev: ControlEvent) {
    match ev {
        ControlEvent::Snapshot(snapshot) => app.apply_snapshot(*snapshot),
        ControlEvent::Offline(reason) => app.mark_offline(&reason),
        ControlEvent::Posted { author } => {
            app.push_traffic(format!("Posted as {author}"));
            app.set_output("post queued; /mine to seal it into a block");
        }
        ControlEvent::Mined(response) => {
            app.push_traffic(format!(
                "{}  ({} posts, chain length {})",
                response.message,
                response.transactions.len(),
                response.chain_length
            ));
            app.set_output(response.message);
        }
        ControlEvent::Synced(response) => {
            let message = if response.replaced {
                format!("Chain replaced by a longer peer chain, length {}", response.chain_length)
            } else {
                format!("Chain is authoritative, length {}", response.chain_length)
            };
            app.push_traffic(message.clone());
            app.set_output(message);
        }
        ControlEvent::Registered(bootstrap) => {
            app.push_traffic(format!("Registered with {bootstrap}"));
        }
        ControlEvent::Switched(address) => {
            app.switch_node(address.clone());
            app.push_traffic(format!("Now exploring {address}"));
        }
        ControlEvent::Error(msg) => {
            app.push_traffic(format!("error: {msg}"));
            app.set_output(format!("error: {msg}"));
        }
    }
}

/// Resolve the path for the TUI's log file.
///
/// Uses `$XDG_DATA_HOME/pcx/pcx.log` when the env var is set, otherwise
/// falls back to `~/.local/share/pcx/pcx.log`.
fn pcx_log_path() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".local").join("share"))
        })
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("pcx").join("pcx.log")
}
