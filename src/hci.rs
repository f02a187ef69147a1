//! Host Controller Interface surface consumed by the pairing engine.
//!
//! The engine never talks to a controller directly: it formulates the two LE
//! security commands through the [`LeSecurity`] port and receives HCI event
//! packets as raw bytes posted into its event queue, parsed here into typed
//! views.

use std::fmt::Debug;

use bytes::Bytes;

pub use consts::*;

use crate::util::Unpacker;

mod consts;

/// Outbound port for HCI LE security commands. Command outcomes return to the
/// session as posted HCI events, never through this trait.
pub trait LeSecurity: Debug + Send + Sync {
    /// Issues `HCI_LE_Enable_Encryption` ([Vol 4] Part E, Section 7.8.24).
    fn start_encryption(&self, handle: ConnHandle, rand: u64, ediv: u16, key: [u8; 16]);

    /// Issues `HCI_LE_Long_Term_Key_Request_Reply`
    /// ([Vol 4] Part E, Section 7.8.25).
    fn long_term_key_reply(&self, handle: ConnHandle, key: [u8; 16]);
}

/// Connection handle.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(transparent)]
pub struct ConnHandle(u16);

impl ConnHandle {
    const MAX: u16 = 0xEFF; // [Vol 4] Part E, Section 5.4.2

    /// Wraps a raw connection handle.
    #[inline]
    #[must_use]
    pub const fn new(h: u16) -> Self {
        Self(h)
    }

    /// Returns whether the connection handle is valid.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 <= Self::MAX
    }
}

impl Default for ConnHandle {
    #[inline]
    fn default() -> Self {
        Self(0xFFFF)
    }
}

impl From<ConnHandle> for u16 {
    #[inline]
    fn from(h: ConnHandle) -> Self {
        h.0
    }
}

/// HCI event packet with a validated header
/// ([Vol 4] Part E, Section 5.4.4).
#[derive(Clone, Debug)]
pub struct Event {
    code: EventCode,
    subevent: Option<SubeventCode>,
    params: Bytes,
}

impl Event {
    /// Parses the event header from a complete event packet. Returns [`None`]
    /// if the packet is malformed or the event code is not one the pairing
    /// engine consumes.
    #[must_use]
    pub fn parse(raw: &Bytes) -> Option<Self> {
        let mut p = Unpacker::new(raw);
        let code = EventCode::try_from(p.u8()).ok()?;
        let len = usize::from(p.u8());
        if !p.is_ok() || p.len() != len {
            return None;
        }
        let mut hdr = 2;
        let subevent = if code == EventCode::LeMetaEvent {
            hdr += 1;
            Some(SubeventCode::try_from(p.u8()).ok()?)
        } else {
            None
        };
        Some(Self {
            code,
            subevent,
            params: raw.slice(hdr..),
        })
    }

    /// Returns the event code.
    #[inline]
    #[must_use]
    pub const fn code(&self) -> EventCode {
        self.code
    }

    /// Returns the LE subevent code, if any.
    #[inline]
    #[must_use]
    pub const fn subevent(&self) -> Option<SubeventCode> {
        self.subevent
    }

    /// Returns an unpacker over the event parameters after the (sub)event
    /// header.
    #[inline]
    pub(crate) fn params(&self) -> Unpacker {
        Unpacker::new(&self.params)
    }
}

/// `HCI_Encryption_Change` event parameters ([Vol 4] Part E, Section 7.7.8).
#[derive(Clone, Copy, Debug)]
pub struct EncryptionChange {
    pub status: Status,
    pub handle: ConnHandle,
    pub enabled: bool,
}

impl EncryptionChange {
    /// Extracts the parameters from `e`, or [`None`] if `e` is not a
    /// well-formed `HCI_Encryption_Change` event.
    #[must_use]
    pub fn unpack(e: &Event) -> Option<Self> {
        (e.code() == EventCode::EncryptionChange).then_some(())?;
        e.params().map(|p| Self {
            status: Status::from(p.u8()),
            handle: ConnHandle::new(p.u16()),
            enabled: p.u8() != 0,
        })
    }
}

/// `HCI_Encryption_Key_Refresh_Complete` event parameters
/// ([Vol 4] Part E, Section 7.7.39).
#[derive(Clone, Copy, Debug)]
pub struct EncryptionKeyRefresh {
    pub status: Status,
    pub handle: ConnHandle,
}

impl EncryptionKeyRefresh {
    /// Extracts the parameters from `e`, or [`None`] if `e` is not a
    /// well-formed `HCI_Encryption_Key_Refresh_Complete` event.
    #[must_use]
    pub fn unpack(e: &Event) -> Option<Self> {
        (e.code() == EventCode::EncryptionKeyRefreshComplete).then_some(())?;
        e.params().map(|p| Self {
            status: Status::from(p.u8()),
            handle: ConnHandle::new(p.u16()),
        })
    }
}

/// `HCI_LE_Long_Term_Key_Request` subevent parameters
/// ([Vol 4] Part E, Section 7.7.65.5).
#[derive(Clone, Copy, Debug)]
pub struct LongTermKeyRequest {
    pub handle: ConnHandle,
    pub rand: u64,
    pub ediv: u16,
}

impl LongTermKeyRequest {
    /// Extracts the parameters from `e`, or [`None`] if `e` is not a
    /// well-formed `HCI_LE_Long_Term_Key_Request` subevent.
    #[must_use]
    pub fn unpack(e: &Event) -> Option<Self> {
        (e.subevent() == Some(SubeventCode::LongTermKeyRequest)).then_some(())?;
        e.params().map(|p| Self {
            handle: ConnHandle::new(p.u16()),
            rand: p.u64(),
            ediv: p.u16(),
        })
    }
}
