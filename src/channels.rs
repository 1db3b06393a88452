//! Static channels bridging stack callbacks to the poll loop.
//!
//! BLE callbacks run on the stack's own task and must not touch fan or
//! connection state. They enqueue here instead; the poll loop drains both
//! queues each tick, so every state mutation happens on one thread.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::commands::OverrideCommand;
use crate::ble::LinkEvent;

/// Link events from the BLE adapter. Sized for a burst of discovery
/// results plus a few notifications.
pub static LINK_CHANNEL: Channel<CriticalSectionRawMutex, LinkEvent, 16> = Channel::new();

/// Override commands from the external control surface.
pub static OVERRIDE_CHANNEL: Channel<CriticalSectionRawMutex, OverrideCommand, 4> = Channel::new();

/// Enqueue a link event; drops it when the queue is full. Returns whether
/// the event was accepted.
pub fn push_link_event(event: LinkEvent) -> bool {
    match LINK_CHANNEL.try_send(event) {
        Ok(()) => true,
        Err(_) => {
            warn!("link event queue full, dropping event");
            false
        }
    }
}

/// Enqueue an override command; drops it when the queue is full.
pub fn push_override(cmd: OverrideCommand) -> bool {
    match OVERRIDE_CHANNEL.try_send(cmd) {
        Ok(()) => true,
        Err(_) => {
            warn!("override queue full, dropping command");
            false
        }
    }
}
