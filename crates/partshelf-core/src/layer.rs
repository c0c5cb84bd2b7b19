// ABOUTME: tracing-subscriber layer that forwards formatted log events to the broadcast channel.
// ABOUTME: Lets general application logging reach live viewers alongside converter output.

use std::fmt::Write as _;

use chrono::Local;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::{Context, Filter, Layer};

use crate::broadcast::LogBroadcaster;

/// Tracing target used for raw converter output lines. Those lines are
/// published to the channel directly, so this layer ignores the target.
pub const CONVERTER_OUTPUT_TARGET: &str = "partshelf::converter_output";

/// Publishes every event it sees as `<timestamp> - <LEVEL> - <message>`.
#[derive(Debug, Clone)]
pub struct BroadcastLayer {
    broadcaster: LogBroadcaster,
}

impl BroadcastLayer {
    pub fn new(broadcaster: LogBroadcaster) -> Self {
        Self { broadcaster }
    }

    /// The per-layer filter installed alongside this layer in `main`: INFO and
    /// above, minus converter output.
    pub fn default_filter<S: Subscriber>() -> impl Filter<S> {
        Targets::new()
            .with_default(LevelFilter::INFO)
            .with_target(CONVERTER_OUTPUT_TARGET, LevelFilter::OFF)
    }
}

impl<S: Subscriber> Layer<S> for BroadcastLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let line = format!(
            "{} - {} - {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level_name(event.metadata().level()),
            visitor.finish()
        );
        self.broadcaster.publish(line);
    }
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
