//! Event sinks.

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Reports every application event through the log facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        info!("event: {event:?}");
    }
}

/// Captures events for host tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(*event);
    }
}
