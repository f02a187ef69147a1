//! Security Manager Protocol ([Vol 3] Part H).
//!
//! A [`PairingSession`] drives one pairing attempt for one connection. The
//! session owns a thread-safe event queue; L2CAP SMP frames, HCI events, and
//! UI answers are posted into it from other threads through [`SessionInput`],
//! while [`PairingSession::run`] executes the phases as straight-line
//! blocking code and produces a single [`PairingResult`] or [`Error`].

use std::fmt::Debug;
use std::time::Duration;

use blepair_crypto::{NumCompare, Passkey};

pub(self) use cmd::*;

pub use cmd::PairingParams;
pub use {consts::*, phase1::*, queue::*, session::*};

use crate::hci;

mod cmd;
mod consts;
mod keys;
mod legacy;
mod phase1;
mod queue;
mod secure;
mod session;


/// Pairing must complete within this time of the last protocol activity
/// ([Vol 3] Part H, Section 3.4).
pub const SMP_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type returned by the SMP layer.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Failure detected locally. `PAIRING_FAILED` with this reason is sent
    /// to the peer before the session terminates.
    #[error("local failure: {reason} ({what})")]
    Local { reason: Reason, what: String },
    /// Peer-reported failure via `PAIRING_FAILED`. Nothing is sent back.
    #[error("remote failure: {0}")]
    Remote(Reason),
    /// Encryption start failed at the controller.
    #[error("encryption failure: {0}")]
    Hci(hci::Status),
    /// No event arrived within [`SMP_TIMEOUT`].
    #[error("pairing timeout")]
    Timeout,
    /// The session was cancelled via an exit event.
    #[error("pairing cancelled")]
    Cancelled,
}

impl Error {
    /// Creates a locally detected failure.
    #[inline]
    pub(super) fn local(reason: Reason, what: impl Into<String>) -> Self {
        Self::Local {
            reason,
            what: what.into(),
        }
    }

    /// Returns the reason code to report to the peer, or [`None`] if the
    /// failure must not produce a `PAIRING_FAILED` PDU.
    #[must_use]
    pub(super) fn report(&self) -> Option<Reason> {
        match *self {
            Self::Local { reason, .. } => Some(reason),
            Self::Hci(_) => Some(Reason::UnspecifiedReason),
            Self::Remote(_) | Self::Timeout | Self::Cancelled => None,
        }
    }
}

/// Common SMP result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Outbound L2CAP port. Completed SMP PDUs are queued for transmission on
/// fixed channel 0x0006.
pub trait SmpPort: Debug + Send + Sync {
    /// Queues a complete SMP PDU for transmission.
    fn send(&self, pdu: &[u8]);
}

/// Host UI port. All prompts are fire-and-forget; the user's answer is
/// posted back to the session as a [`UiAction`] event.
pub trait Ui: Debug + Send + Sync {
    /// Asks the user to accept or reject pairing with the remote device.
    fn confirm_pairing(&self);

    /// Shows a 6-digit numeric comparison value and asks for a yes/no
    /// confirmation.
    fn confirm_numeric(&self, n: NumCompare);

    /// Shows the passkey that the user must enter on the remote device.
    fn display_passkey(&self, passkey: Passkey);

    /// Asks the user to enter the passkey shown by the remote device.
    fn request_passkey(&self);
}
