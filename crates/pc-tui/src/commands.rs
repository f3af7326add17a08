//! Slash commands typed at the prompt.

/// A parsed prompt line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Post { author: String, content: String },
    Mine,
    Sync,
    Register(String),
    SwitchNode(String),
    Refresh,
    View(View),
    Help,
    Quit,
    Nothing,
}

/// Views reachable by command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Posts,
    Status,
    Pending,
    Peers,
    Traffic,
}

pub const HELP: &[&str] = &[
    "─── available commands ─────────────────────────────────────",
    "/post <author>: <content>    submit a post",
    "/mine                        mine pending posts into a block",
    "/sync                        run consensus on the node",
    "/register <addr>             register the node with another node",
    "/node <addr>                 switch to another node",
    "/refresh                     poll the node now",
    "/posts /status /pending      switch view",
    "/peers /traffic              switch view",
    "/help                        show this help",
    "/quit                        quit pcx",
    "keys: ↑/↓ history · PgUp/PgDn scroll · Tab next view · Ctrl-C quit",
    "────────────────────────────────────────────────────────────",
];

/// Parse one prompt line.  The error is a usage hint for the user.
pub fn parse(raw: &str) -> Result<Command, String> {
    let raw = raw.trim();
    let (cmd, arg) = match raw.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (raw, ""),
    };

    let command = match cmd {
        "" => Command::Nothing,
        "/post" => {
            let usage = || "Usage: /post <author>: <content>".to_string();
            let (author, content) = arg.split_once(':').ok_or_else(usage)?;
            let (author, content) = (author.trim(), content.trim());
            if author.is_empty() || content.is_empty() {
                return Err(usage());
            }
            Command::Post {
                author: author.into(),
                content: content.into(),
            }
        }
        "/mine" => Command::Mine,
        "/sync" => Command::Sync,
        "/register" => Command::Register(required(arg, "Usage: /register <addr>")?),
        "/node" => Command::SwitchNode(required(arg, "Usage: /node <addr>")?),
        "/refresh" => Command::Refresh,
        "/posts" => Command::View(View::Posts),
        "/status" => Command::View(View::Status),
        "/pending" => Command::View(View::Pending),
        "/peers" => Command::View(View::Peers),
        "/traffic" => Command::View(View::Traffic),
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => return Err(format!("Unknown command: {other}  (try /help)")),
    };
    Ok(command)
}

fn required(arg: &str, usage: &str) -> Result<String, String> {
    if arg.is_empty() {
        Err(usage.to_string())
    } else {
        Ok(arg.to_string())
    }
}
