use std::collections::VecDeque;

use pc_blockchain::Transaction;
use pc_node::protocol::NodeStatus;

use crate::{commands::View, controller::Snapshot, posts::{posts_from_chain, Post}};

/// Maximum number of traffic entries kept in memory.
const MAX_TRAFFIC: usize = 500;

/// Whether the node answered the last poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    Connecting,
    Online,
    Offline,
}

impl Connection {
    pub fn label(&self) -> &str {
        match self {
            Connection::Connecting => "connecting…",
            Connection::Online => "online",
            Connection::Offline => "offline",
        }
    }
}

/// A timestamped traffic event.
#[derive(Debug, Clone)]
pub struct TrafficEntry {
    pub timestamp: String,
    pub message: String,
}

/// Maximum entries kept in the command history shown in the input panel.
const MAX_HISTORY: usize = 200;

/// The complete TUI state.
pub struct App {
    /// Address of the node being explored.
    pub node: String,
    pub connection: Connection,
    pub status: Option<NodeStatus>,
    pub chain_valid: bool,
    pub posts: Vec<Post>,
    pub pending: Vec<Transaction>,
    pub peers: Vec<String>,
    pub traffic: VecDeque<TrafficEntry>,
    pub view: View,
    /// First visible row of the current view.
    pub scroll: usize,
    /// Text the user is currently typing.
    pub input: String,
    /// History of commands executed this session (most recent last).
    pub command_history: VecDeque<String>,
    /// Position within `command_history` during ↑/↓ navigation.
    /// `None` means not navigating (user is editing fresh input).
    pub history_cursor: Option<usize>,
    /// Snapshot of `input` saved the moment history navigation begins,
    /// restored when the user scrolls back past the most-recent command.
    pub input_snapshot: String,
    /// Optional one-line feedback message shown below the input (error / info).
    pub command_output: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            connection: Connection::Connecting,
            status: None,
            chain_valid: true,
            posts: Vec::new(),
            pending: Vec::new(),
            peers: Vec::new(),
            traffic: VecDeque::new(),
            view: View::Posts,
            scroll: 0,
            input: String::new(),
            command_history: VecDeque::new(),
            history_cursor: None,
            input_snapshot: String::new(),
            command_output: None,
            should_quit: false,
        }
    }

    /// Replace the node data with a fresh poll.  Changes worth noticing are
    /// logged to traffic.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        if self.connection != Connection::Online {
            self.push_traffic(format!("Connected to {}", self.node));
            self.connection = Connection::Online;
        }

        let previous = self.status.as_ref().map(|s| s.length);
        let length = snapshot.chain.length;
        if let Some(previous) = previous {
            if length != previous {
                self.push_traffic(format!("Chain length {previous} → {length}"));
            }
        }
        if self.chain_valid && !snapshot.chain.is_valid {
            self.push_traffic("error: node reports an invalid chain");
        }

        self.chain_valid = snapshot.chain.is_valid;
        self.posts = posts_from_chain(&snapshot.chain.chain);
        self.peers = snapshot.chain.peers;
        self.pending = snapshot.pending;
        self.status = Some(snapshot.status);
        self.clamp_scroll();
    }

    pub fn mark_offline(&mut self, reason: &str) {
        if self.connection != Connection::Offline {
            self.push_traffic(format!("error: {} unreachable: {reason}", self.node));
            self.connection = Connection::Offline;
        }
    }

    /// Forget everything learned from the previous node.
    pub fn switch_node(&mut self, node: impl Into<String>) {
        self.node = node.into();
        self.connection = Connection::Connecting;
        self.status = None;
        self.chain_valid = true;
        self.posts.clear();
        self.pending.clear();
        self.peers.clear();
        self.scroll = 0;
    }

    pub fn set_view(&mut self, view: View) {
        if self.view != view {
            self.view = view;
            self.scroll = match view {
                View::Traffic => self.traffic.len().saturating_sub(1),
                _ => 0,
            };
        }
    }

    /// Cycle through views (Tab).
    pub fn next_view(&mut self) {
        let next = match self.view {
            View::Posts => View::Status,
            View::Status => View::Pending,
            View::Pending => View::Peers,
            View::Peers => View::Traffic,
            View::Traffic => View::Posts,
        };
        self.set_view(next);
    }

    /// Number of rows the current view scrolls over.
    fn rows(&self) -> usize {
        match self.view {
            View::Posts => self.posts.len(),
            View::Pending => self.pending.len(),
            View::Peers => self.peers.len(),
            View::Traffic => self.traffic.len(),
            View::Status => 0,
        }
    }

    fn clamp_scroll(&mut self) {
        self.scroll = self.scroll.min(self.rows().saturating_sub(1));
    }

    /// Record a command in the history log.
    pub fn push_history(&mut self, cmd: impl Into<String>) {
        self.command_history.push_back(cmd.into());
        if self.command_history.len() > MAX_HISTORY {
            self.command_history.pop_front();
        }
    }

    /// Move backward through history (↑).  Saves the live input on first call.
    pub fn history_prev(&mut self) {
        if self.command_history.is_empty() {
            return;
        }
        let max_idx = self.command_history.len() - 1;
        match self.history_cursor {
            None => {
                self.input_snapshot = self.input.clone();
                self.history_cursor = Some(max_idx);
            }
            Some(idx) if idx > 0 => {
                self.history_cursor = Some(idx - 1);
            }
            _ => return, // already at oldest
        }
        if let Some(idx) = self.history_cursor {
            if let Some(cmd) = self.command_history.get(idx) {
                self.input = cmd.clone();
            }
        }
    }

    /// Move forward through history (↓).  Restores live input when past the newest.
    pub fn history_next(&mut self) {
        let Some(idx) = self.history_cursor else {
            return;
        };
        if idx + 1 < self.command_history.len() {
            self.history_cursor = Some(idx + 1);
            if let Some(cmd) = self.command_history.get(idx + 1) {
                self.input = cmd.clone();
            }
        } else {
            self.history_cursor = None;
            self.input = std::mem::take(&mut self.input_snapshot);
        }
    }

    /// Reset history navigation state (call on Enter or any typed character).
    pub fn reset_history_nav(&mut self) {
        self.history_cursor = None;
        self.input_snapshot = String::new();
    }

    /// Push a timestamped entry into the traffic log.
    pub fn push_traffic(&mut self, message: impl Into<String>) {
        use chrono::Local;
        let entry = TrafficEntry {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            message: message.into(),
        };
        self.traffic.push_back(entry);
        if self.traffic.len() > MAX_TRAFFIC {
            self.traffic.pop_front();
        }
        if self.view == View::Traffic {
            self.scroll = self.traffic.len().saturating_sub(1);
        }
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        if self.scroll + 1 < self.rows() {
            self.scroll += 1;
        }
    }

    pub fn set_output(&mut self, msg: impl Into<String>) {
        self.command_output = Some(msg.into());
    }

    pub fn clear_output(&mut self) {
        self.command_output = None;
    }
}

#[cfg(test)]
mod tests {
    use pc_blockchain::Block;
    use pc_node::{protocol::ChainView, NodeState};

    use super::*;

    fn snapshot(blocks: Vec<Block>, pending: usize) -> Snapshot {
        let length = blocks.len();
        Snapshot {
            status: NodeStatus {
                state: NodeState::Idle,
                length,
                pending,
                peers: 1,
                difficulty: 2,
                tip: blocks[length - 1].hash.clone(),
            },
            chain: ChainView {
                length,
                chain: blocks,
                is_valid: true,
                difficulty: 2,
                peers: vec!["http://peer:8000".into()],
            },
            pending: (0..pending)
                .map(|i| Transaction::at("p", format!("{i}"), 0))
                .collect(),
        }
    }

    #[test]
    fn history_walks_back_and_restores_live_input() {
        let mut app = App::new("n");
        app.push_history("/mine");
        app.push_history("/sync");
        app.input = "/po".into();

        app.history_prev();
        assert_eq!(app.input, "/sync");
        app.history_prev();
        assert_eq!(app.input, "/mine");
        app.history_prev();
        assert_eq!(app.input, "/mine");

        app.history_next();
        assert_eq!(app.input, "/sync");
        app.history_next();
        assert_eq!(app.input, "/po");
        assert!(app.history_cursor.is_none());
    }

    #[test]
    fn snapshot_brings_node_online_and_fills_views() {
        let mut app = App::new("http://n:8000");
        app.apply_snapshot(snapshot(vec![Block::genesis()], 2));

        assert_eq!(app.connection, Connection::Online);
        assert!(app.posts.is_empty());
        assert_eq!(app.pending.len(), 2);
        assert_eq!(app.peers, vec!["http://peer:8000"]);
        assert!(app.traffic.back().unwrap().message.contains("Connected"));
    }

    #[test]
    fn offline_is_logged_once() {
        let mut app = App::new("n");
        app.mark_offline("refused");
        app.mark_offline("refused");
        assert_eq!(app.connection, Connection::Offline);
        assert_eq!(app.traffic.len(), 1);
    }

    #[test]
    fn switching_node_clears_state() {
        let mut app = App::new("a");
        app.apply_snapshot(snapshot(vec![Block::genesis()], 1));
        app.switch_node("b");
        assert_eq!(app.node, "b");
        assert_eq!(app.connection, Connection::Connecting);
        assert!(app.status.is_none());
        assert!(app.pending.is_empty());
    }

    #[test]
    fn views_cycle_and_scroll_is_bounded() {
        let mut app = App::new("n");
        app.apply_snapshot(snapshot(vec![Block::genesis()], 3));
        app.set_view(View::Pending);
        for _ in 0..10 {
            app.scroll_down();
        }
        assert_eq!(app.scroll, 2);

        app.next_view();
        assert_eq!(app.view, View::Peers);
        assert_eq!(app.scroll, 0);
    }
}
