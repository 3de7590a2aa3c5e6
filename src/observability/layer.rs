//! `tracing` layer feeding events into the log shipper.

use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::observability::shipper::{LogLevel, LogRecord, LogShipper};

/// Turns each event it sees into a [`LogRecord`] and submits it.
///
/// The logger name is the event target. Structured fields are appended to
/// the message as `key=value`.
#[derive(Debug, Clone)]
pub struct ShipperLayer {
    shipper: LogShipper,
}

impl ShipperLayer {
    pub fn new(shipper: LogShipper) -> Self {
        Self { shipper }
    }
}

impl<S: Subscriber> Layer<S> for ShipperLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        let record = LogRecord::new(LogLevel::from(metadata.level()), metadata.target(), visitor.finish());
        self.shipper.submit(record);
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            return self.message;
        }
        let fields = self.fields.join(" ");
        if self.message.is_empty() {
            fields
        } else {
            format!("{} {}", self.message, fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}
