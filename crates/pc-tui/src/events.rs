use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent, KeyEventKind};

/// Terminal input events produced by the event loop.
#[derive(Debug, Clone)]
pub enum TuiEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Poll for the next event, blocking at most `tick_rate`.
pub fn next_event(tick_rate: Duration) -> std::io::Result<TuiEvent> {
    if event::poll(tick_rate)? {
        match event::read()? {
            // Windows reports key releases too.
            Event::Key(key) if key.kind == KeyEventKind::Press => return Ok(TuiEvent::Key(key)),
            Event::Resize(_, _) => return Ok(TuiEvent::Resize),
            _ => {}
        }
    }
    Ok(TuiEvent::Tick)
}
