//! Device events for the entity layer
//!
//! Every [`StormAudioDevice::subscribe`](crate::StormAudioDevice::subscribe)
//! call gets its own queue. A status line that changes the session yields one
//! `Update` per entity, so a single list commit can queue a few dozen events.

use crate::config::DeviceConfig;
use crate::error::{Result, StormAudioError};
use crate::projection::Attributes;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// Event emitted by a device towards the entity layer
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// TCP connection established
    Connected,

    /// Connection ended (peer EOF or local close)
    Disconnected,

    /// Fresh attributes for one entity
    Update {
        entity_id: String,
        attributes: Attributes,
    },

    /// A bulk list was committed; the config carries the new lists and
    /// should be persisted by the host
    ConfigUpdated(Box<DeviceConfig>),
}

/// One subscriber's view of a device's events
///
/// Events survive reconnects: the same receiver sees `Disconnected` and then
/// `Connected` again when the host reconnects the device. A receiver that
/// falls behind loses the oldest updates; it should then re-read
/// [`entity_attributes`](crate::StormAudioDevice::entity_attributes) for
/// every entity it shows.
pub struct EventReceiver {
    rx: broadcast::Receiver<DeviceEvent>,
}

fn lagged(skipped: u64) -> StormAudioError {
    StormAudioError::ChannelError(format!("Lagged by {} messages", skipped))
}

impl EventReceiver {
    pub(crate) fn new(rx: broadcast::Receiver<DeviceEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the next event
    ///
    /// A dropped connection is reported as `Disconnected`, not as an error.
    /// `ConnectionClosed` only comes back once every clone of the device has
    /// been dropped and the queue is drained. After a `ChannelError` the
    /// receiver continues with the oldest event still queued.
    pub async fn recv(&mut self) -> Result<DeviceEvent> {
        self.rx.recv().await.map_err(|e| match e {
            RecvError::Closed => StormAudioError::ConnectionClosed,
            RecvError::Lagged(skipped) => lagged(skipped),
        })
    }

    /// Next queued event, or `None` when nothing is waiting
    pub fn try_recv(&mut self) -> Result<Option<DeviceEvent>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(StormAudioError::ConnectionClosed),
            Err(TryRecvError::Lagged(skipped)) => Err(lagged(skipped)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lagging_receiver_resumes_at_oldest_event() {
        let (tx, rx) = broadcast::channel(2);
        let mut events = EventReceiver::new(rx);

        tx.send(DeviceEvent::Connected).unwrap();
        tx.send(DeviceEvent::Disconnected).unwrap();
        tx.send(DeviceEvent::Connected).unwrap();
        tx.send(DeviceEvent::Disconnected).unwrap();

        let err = events.recv().await.unwrap_err();
        assert!(
            matches!(err, StormAudioError::ChannelError(ref msg) if msg == "Lagged by 2 messages")
        );
        assert!(matches!(events.try_recv(), Ok(Some(DeviceEvent::Connected))));
        assert!(matches!(events.try_recv(), Ok(Some(DeviceEvent::Disconnected))));
        assert!(matches!(events.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_queued_events_drain_before_closed() {
        let (tx, rx) = broadcast::channel::<DeviceEvent>(4);
        let mut events = EventReceiver::new(rx);
        assert!(matches!(events.try_recv(), Ok(None)));

        tx.send(DeviceEvent::Disconnected).unwrap();
        drop(tx);
        assert!(matches!(events.recv().await, Ok(DeviceEvent::Disconnected)));
        assert!(matches!(events.recv().await, Err(StormAudioError::ConnectionClosed)));
    }
}
