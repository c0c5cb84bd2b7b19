// ABOUTME: Process-wide log fan-out channel feeding live browser viewers.
// ABOUTME: Producers publish ANSI-stripped lines; each viewer holds its own subscription handle.

use std::sync::LazyLock;

use futures::stream::{Stream, StreamExt};
use regex::Regex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Default number of lines a slow viewer may fall behind before it starts
/// losing the oldest ones.
pub const DEFAULT_CAPACITY: usize = 1024;

static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[mK]").expect("ansi pattern is valid"));

/// Remove terminal color and erase-line escape sequences.
pub fn strip_ansi(text: &str) -> String {
    ANSI_RE.replace_all(text, "").into_owned()
}

/// One line of log output. Ordering in the channel is the only timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub text: String,
}

/// The log broadcast channel.
///
/// Created once at startup and never torn down; cheap to clone into every
/// producer (request handlers, the sweeper, the tracing layer). Lines are not
/// persisted or replayed: a viewer that subscribes late misses earlier lines,
/// and a viewer that falls more than the channel capacity behind skips ahead.
#[derive(Debug, Clone)]
pub struct LogBroadcaster {
    tx: broadcast::Sender<LogEvent>,
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LogBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a line to every current subscriber. Blank lines (after ANSI
    /// stripping) are dropped. Never blocks.
    pub fn publish(&self, line: impl AsRef<str>) {
        let text = strip_ansi(line.as_ref());
        if text.trim().is_empty() {
            return;
        }
        // No subscribers is the normal idle state
        let _ = self.tx.send(LogEvent { text });
    }

    pub fn subscribe(&self) -> LogSubscription {
        LogSubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A single viewer's handle on the broadcast channel.
#[derive(Debug)]
pub struct LogSubscription {
    rx: broadcast::Receiver<LogEvent>,
}

impl LogSubscription {
    /// Wait for the next line. Returns `None` once every broadcaster clone is
    /// gone. Lines lost to lag are skipped silently.
    pub async fn recv(&mut self) -> Option<LogEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Return whatever is buffered right now without waiting.
    pub fn drain(&mut self) -> Vec<LogEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return events,
            }
        }
    }

    /// Convert into a stream of lines, dropping lag notifications.
    pub fn into_stream(self) -> impl Stream<Item = LogEvent> + Send + 'static {
        BroadcastStream::new(self.rx).filter_map(|result| async move { result.ok() })
    }
}
