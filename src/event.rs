use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Terminal was resized, redraw
  Resize,
  /// Periodic tick for preference sync and cache polling
  Tick,
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
      let mut reader = EventStream::new();
      let mut ticker = tokio::time::interval(tick_rate);
      ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

      loop {
        let event = tokio::select! {
          _ = ticker.tick() => Event::Tick,
          maybe = reader.next() => match maybe {
            Some(Ok(CrosstermEvent::Key(key))) if key.kind == KeyEventKind::Press => Event::Key(key),
            Some(Ok(CrosstermEvent::Resize(_, _))) => Event::Resize,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
              warn!(error = %e, "terminal event stream failed");
              break;
            }
            None => break,
          },
        };
        if tx.send(event).is_err() {
          break;
        }
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
