use tokio::sync::mpsc;

/// Unbounded fan-in event channel with a single consumer.
///
/// Any number of publisher handles feed one receiver obtained at
/// construction. Publishing never blocks; events sent after the receiver
/// is dropped are discarded.
pub struct EventBus<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> EventBus<T> {
    /// Create a bus together with its sole receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue an event. A closed receiver drops the event silently.
    pub fn publish(&self, event: T) {
        let _ = self.tx.send(event);
    }

    /// False once the receiving end has been dropped.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}
