use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};

use super::{Error, Result};

/// Event delivered to a pairing session.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum PairingEvent {
    /// Immediate session termination request.
    Exit,
    /// SMP PDU received on L2CAP fixed channel 0x0006.
    Command(Bytes),
    /// HCI event packet.
    HciEvent(Bytes),
    /// User response to a UI prompt.
    Ui(UiAction),
}

/// User action posted in response to a UI prompt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(clippy::exhaustive_enums)]
pub enum UiAction {
    /// User accepted the pairing prompt.
    PairingAccepted,
    /// Yes/no answer to a numeric comparison prompt.
    ConfirmYesNo(bool),
    /// Passkey entered by the user.
    Passkey(u32),
}

/// Producer handle for posting events into a running session. Cloneable and
/// safe to use from any thread.
#[derive(Clone, Debug)]
pub struct SessionInput(pub(super) Arc<EventQueue>);

impl SessionInput {
    /// Posts an SMP PDU received from the peer.
    #[inline]
    pub fn command(&self, pdu: Bytes) {
        self.0.post(PairingEvent::Command(pdu));
    }

    /// Posts an HCI event packet.
    #[inline]
    pub fn hci_event(&self, event: Bytes) {
        self.0.post(PairingEvent::HciEvent(event));
    }

    /// Posts a user action.
    #[inline]
    pub fn ui(&self, action: UiAction) {
        self.0.post(PairingEvent::Ui(action));
    }

    /// Requests immediate session termination.
    #[inline]
    pub fn exit(&self) {
        self.0.post(PairingEvent::Exit);
    }
}

/// Thread-safe inbound event queue feeding a single pairing session. One
/// mutex-protected FIFO plus a condition variable to wake the sole consumer.
#[derive(Debug)]
pub(super) struct EventQueue {
    queue: Mutex<VecDeque<PairingEvent>>,
    ready: Condvar,
    timeout: Duration,
}

impl EventQueue {
    /// Creates an empty queue. `timeout` bounds each [`Self::wait`] call.
    pub fn new(timeout: Duration) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            timeout,
        }
    }

    /// Appends an event and wakes the consumer.
    pub fn post(&self, e: PairingEvent) {
        self.queue.lock().push_back(e);
        self.ready.notify_one();
    }

    /// Blocks until the next event is available. The timeout is re-armed on
    /// every call; if it expires with the queue still empty, the session is
    /// over ([Vol 3] Part H, Section 3.4).
    pub fn wait(&self) -> Result<PairingEvent> {
        let deadline = Instant::now() + self.timeout;
        let mut q = self.queue.lock();
        loop {
            if let Some(e) = q.pop_front() {
                return Ok(e);
            }
            if self.ready.wait_until(&mut q, deadline).timed_out() {
                return q.pop_front().ok_or(Error::Timeout);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn fifo_order() {
        let q = EventQueue::new(Duration::from_secs(1));
        q.post(PairingEvent::Exit);
        q.post(PairingEvent::Ui(UiAction::PairingAccepted));
        q.post(PairingEvent::Ui(UiAction::Passkey(7)));
        assert!(matches!(q.wait(), Ok(PairingEvent::Exit)));
        assert!(matches!(
            q.wait(),
            Ok(PairingEvent::Ui(UiAction::PairingAccepted))
        ));
        assert!(matches!(
            q.wait(),
            Ok(PairingEvent::Ui(UiAction::Passkey(7)))
        ));
    }

    #[test]
    fn wakes_blocked_consumer() {
        let q = Arc::new(EventQueue::new(Duration::from_secs(5)));
        let input = SessionInput(Arc::clone(&q));
        let t = thread::spawn(move || q.wait());
        thread::sleep(Duration::from_millis(20));
        input.ui(UiAction::ConfirmYesNo(true));
        assert!(matches!(
            t.join().unwrap(),
            Ok(PairingEvent::Ui(UiAction::ConfirmYesNo(true)))
        ));
    }

    #[test]
    fn timeout_when_idle() {
        let q = EventQueue::new(Duration::from_millis(20));
        let start = Instant::now();
        assert!(matches!(q.wait(), Err(Error::Timeout)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
