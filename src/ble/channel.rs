//! [`Radio`] over a pair of Embassy channels.
//!
//! Commands go to the SoftDevice task with `try_send`, so issuing one from
//! the event handler never blocks. Events come back on the second channel
//! and are received with a deadline.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver, Sender};
use embassy_time::{with_deadline, Instant};

use crate::ble::{Radio, RadioCommand, RadioEvent};

/// Depth of the command queue.
pub const COMMAND_QUEUE: usize = 8;

/// Depth of the event queue.
pub const EVENT_QUEUE: usize = 16;

pub type CommandSender = Sender<'static, CriticalSectionRawMutex, RadioCommand, COMMAND_QUEUE>;
pub type CommandReceiver = Receiver<'static, CriticalSectionRawMutex, RadioCommand, COMMAND_QUEUE>;
pub type EventSender = Sender<'static, CriticalSectionRawMutex, RadioEvent, EVENT_QUEUE>;
pub type EventReceiver = Receiver<'static, CriticalSectionRawMutex, RadioEvent, EVENT_QUEUE>;

/// Controller-side end of the radio task's two channels.
pub struct ChannelRadio {
    commands: CommandSender,
    events: EventReceiver,
}

impl ChannelRadio {
    pub fn new(commands: CommandSender, events: EventReceiver) -> Self {
        Self { commands, events }
    }
}

impl Radio for ChannelRadio {
    fn submit(&mut self, command: RadioCommand) {
        if self.commands.try_send(command).is_err() {
            warn!("radio command queue full; command dropped");
        }
    }

    async fn next_event(&mut self, deadline: Instant) -> Option<RadioEvent> {
        with_deadline(deadline, self.events.receive()).await.ok()
    }
}
