use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use blepair_crypto::{
    IdentityResolvingKey, LongTermKey, Mac, Nonce, PublicKey, SecretKey, SigningKey,
};

use crate::hci::{ConnHandle, LeSecurity, Role};
use crate::le;

use super::*;

/// Where a session begins.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(clippy::exhaustive_enums)]
pub enum StartPhase {
    /// Remote-initiated pairing: wait for local user consent, then run the
    /// feature exchange as responder.
    AcceptPrompt,
    /// Locally initiated pairing: send the Pairing Request.
    Phase1,
    /// Re-encrypt the link with the keys of an existing bond; no feature
    /// exchange or key distribution takes place.
    Phase2,
}

/// Session inputs, fixed for the lifetime of one pairing attempt.
#[derive(Debug)]
pub struct SessionParams {
    /// Local link layer role. The central is always the pairing initiator.
    pub role: Role,
    /// Connection handle used for HCI commands and event matching.
    pub handle: ConnHandle,
    pub local_addr: le::Addr,
    pub remote_addr: le::Addr,
    /// Local feature set sent in the Pairing Request or Response.
    pub features: PairingParams,
    /// Keys this device may distribute during Phase 3.
    pub local_keys: LocalKeys,
    /// Out-of-band pairing inputs.
    pub oob: Oob,
    /// The peer's Pairing Request, when the session starts as responder.
    pub peer_request: Option<PairingParams>,
    /// Existing bond for a [`StartPhase::Phase2`] session.
    pub bond: Option<EncKey>,
    /// Outbound L2CAP port.
    pub smp: Arc<dyn SmpPort>,
    /// Outbound HCI LE security command port.
    pub security: Arc<dyn LeSecurity>,
    /// Host UI prompt port.
    pub ui: Arc<dyn Ui>,
}

/// Keys available for local distribution during Phase 3. Any negotiated key
/// that is not supplied here is generated randomly at distribution time.
#[derive(Debug, Default)]
pub struct LocalKeys {
    /// LTK, EDIV, and Rand distributed under legacy pairing.
    pub enc: Option<EncKey>,
    /// Identity Resolving Key.
    pub irk: Option<IdentityResolvingKey>,
    /// Public or static identity address; defaults to the local address.
    pub identity: Option<le::Addr>,
    /// Connection Signature Resolving Key.
    pub csrk: Option<SigningKey>,
}

/// Encryption key identified by EDIV and Rand. Both identifiers are zero for
/// an LE Secure Connections bond.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EncKey {
    pub ltk: LongTermKey,
    pub ediv: u16,
    pub rand: u64,
}

/// Out-of-band pairing inputs.
#[derive(Debug, Default)]
pub struct Oob {
    /// Previously generated local OOB data whose payload was delivered to
    /// the peer.
    pub local: Option<LocalOob>,
    /// Random value from the peer's OOB payload.
    pub remote: Option<u128>,
    /// Shared 128-bit temporary key for legacy OOB pairing.
    pub legacy_tk: Option<u128>,
}

/// Private half of locally generated OOB data. Created by
/// [`LocalOob::generate`] before the session starts.
#[derive(Debug)]
pub struct LocalOob {
    pub(super) secret: SecretKey,
    pub(super) random: u128,
}

impl LocalOob {
    /// Generates a fresh OOB key pair, returning the private half for
    /// [`Oob::local`] and the payload to deliver to the peer out of band
    /// ([Vol 3] Part H, Section 2.3.5.6.4).
    pub fn generate() -> (Self, OobPayload) {
        let secret = SecretKey::new();
        let public_key = secret.public_key();
        let r = Nonce::new();
        let confirm = r.f4(public_key.x(), public_key.x(), 0);
        (
            Self {
                secret,
                random: r.0,
            },
            OobPayload {
                public_key,
                random: r.0,
                confirm,
            },
        )
    }
}

/// OOB payload delivered to the peer through an out-of-band channel.
#[derive(Debug)]
pub struct OobPayload {
    pub public_key: PublicKey,
    pub random: u128,
    pub confirm: Mac,
}

/// Keys exchanged in one direction during Phase 3.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct DistributedKeys {
    pub enc: Option<EncKey>,
    pub irk: Option<IdentityResolvingKey>,
    pub identity: Option<le::Addr>,
    pub csrk: Option<SigningKey>,
}

/// Successful pairing outcome.
#[derive(Debug)]
pub struct PairingResult {
    /// Whether LE Secure Connections was used.
    pub secure_connections: bool,
    /// Whether the association model provides MITM protection.
    pub authenticated: bool,
    /// Negotiated encryption key size in octets.
    pub key_size: u8,
    /// LTK derived via `f5` (Secure Connections only). Legacy long-term keys
    /// travel in [`Self::peer_keys`] and [`Self::local_keys`].
    pub ltk: Option<LongTermKey>,
    /// Keys received from the peer.
    pub peer_keys: DistributedKeys,
    /// Keys sent to the peer.
    pub local_keys: DistributedKeys,
}

/// A single pairing attempt for one connection.
///
/// The session is created with its initial phase, driven to completion by
/// [`Self::run`] on a caller-owned thread, and then discarded. A failed
/// session is terminal; retry requires a new session.
#[derive(Debug)]
pub struct PairingSession {
    pub(super) params: SessionParams,
    start: StartPhase,
    queue: Arc<EventQueue>,
    // Holds an early PAIRING_CONFIRM received while waiting for passkey
    // input. At most one can arrive.
    pub(super) cached_confirm: Option<Mac>,
}

impl PairingSession {
    /// Creates a new session.
    #[must_use]
    pub fn new(start: StartPhase, params: SessionParams) -> Self {
        Self::with_timeout(start, params, SMP_TIMEOUT)
    }

    pub(super) fn with_timeout(
        start: StartPhase,
        params: SessionParams,
        timeout: Duration,
    ) -> Self {
        Self {
            params,
            start,
            queue: Arc::new(EventQueue::new(timeout)),
            cached_confirm: None,
        }
    }

    /// Returns a producer handle for posting events into the session.
    #[must_use]
    pub fn input(&self) -> SessionInput {
        SessionInput(Arc::clone(&self.queue))
    }

    /// Runs the session to completion. On a locally detected failure,
    /// `PAIRING_FAILED` is sent to the peer before returning; timeouts,
    /// cancellations, and peer-reported failures produce no further PDUs.
    pub fn run(mut self) -> Result<PairingResult> {
        let result = self.main();
        match result {
            Ok(_) => debug!("pairing complete"),
            Err(ref e) => {
                warn!("pairing failed: {e}");
                if let Some(reason) = e.report() {
                    self.send(&Command::PairingFailed(reason));
                }
            }
        }
        result
    }

    fn main(&mut self) -> Result<PairingResult> {
        match self.start {
            StartPhase::AcceptPrompt => {
                self.params.ui.confirm_pairing();
                self.wait_ui_accept()?;
            }
            StartPhase::Phase1 => {}
            StartPhase::Phase2 => return self.reencrypt(),
        }
        let feat = self.exchange_features()?;
        debug!(
            "features: sc={} model={:?} key_size={}",
            feat.secure, feat.model, feat.key_size
        );
        let (key, ltk) = if feat.secure {
            let ltk = self.secure_connections(&feat)?;
            (ltk.to_le_bytes(), Some(ltk))
        } else {
            (self.legacy_pairing(&feat)?.to_le_bytes(), None)
        };
        self.start_encryption(key, 0, 0)?;
        let (local_keys, peer_keys) = self.distribute_keys(&feat)?;
        Ok(PairingResult {
            secure_connections: feat.secure,
            authenticated: feat.model.authenticated(),
            key_size: feat.key_size,
            ltk,
            peer_keys,
            local_keys,
        })
    }

    /// Re-encrypts the link with an existing bond. The security properties
    /// of the link are those of the pairing that created the bond; the
    /// outcome reports only the transport state.
    fn reencrypt(&mut self) -> Result<PairingResult> {
        let bond = self
            .params
            .bond
            .ok_or_else(|| Error::local(Reason::UnspecifiedReason, "no bond to re-encrypt"))?;
        self.start_encryption(bond.ltk.to_le_bytes(), bond.ediv, bond.rand)?;
        Ok(PairingResult {
            secure_connections: false,
            authenticated: false,
            key_size: 16,
            ltk: Some(bond.ltk),
            peer_keys: DistributedKeys::default(),
            local_keys: DistributedKeys::default(),
        })
    }

    /// Returns whether the local device is the pairing initiator.
    #[inline]
    pub(super) fn is_initiator(&self) -> bool {
        self.params.role == Role::Central
    }

    /// Returns the `(A, B)` address parameters of the `f5`, `f6`, and `c1`
    /// functions: A is the initiator, B the responder.
    pub(super) fn addr_ab(&self) -> (blepair_crypto::Addr, blepair_crypto::Addr) {
        let (local, remote) = (self.params.local_addr, self.params.remote_addr);
        if self.is_initiator() {
            (local.into(), remote.into())
        } else {
            (remote.into(), local.into())
        }
    }

    /// Packs and queues `cmd` for transmission.
    pub(super) fn send(&self, cmd: &Command) {
        trace!("-> {}", cmd.code());
        self.params.smp.send(&cmd.pack());
    }

    /// Blocks until the next event or timeout.
    fn wait_event(&self) -> Result<PairingEvent> {
        self.queue.wait()
    }

    /// Waits for the SMP command with code `code`. Anything else fails: exit
    /// and timeout terminate silently, a peer `PAIRING_FAILED` surfaces its
    /// reason, and any other input produces a failure naming what was
    /// expected and what arrived.
    pub(super) fn wait_command(&mut self, code: Code) -> Result<Command> {
        match self.wait_event()? {
            PairingEvent::Exit => Err(Error::Cancelled),
            PairingEvent::HciEvent(_) => Err(Error::local(
                Reason::UnspecifiedReason,
                format!("expecting {code}, received HCI event"),
            )),
            PairingEvent::Ui(_) => Err(Error::local(
                Reason::UnspecifiedReason,
                format!("expecting {code}, received UI action"),
            )),
            PairingEvent::Command(pdu) => {
                let cmd = Command::try_from(pdu.as_ref())
                    .map_err(|r| Error::local(r, format!("malformed PDU, expecting {code}")))?;
                trace!("<- {}", cmd.code());
                if cmd.code() == code {
                    return Ok(cmd);
                }
                if let Command::PairingFailed(reason) = cmd {
                    return Err(Error::Remote(reason));
                }
                Err(Error::local(
                    Reason::UnspecifiedReason,
                    format!("expecting {code}, received {}", cmd.code()),
                ))
            }
        }
    }

    /// Waits for `PAIRING_CONFIRM`, consuming a cached early arrival first.
    pub(super) fn wait_confirm(&mut self) -> Result<Mac> {
        if let Some(m) = self.cached_confirm.take() {
            return Ok(m);
        }
        match self.wait_command(Code::PairingConfirm)? {
            Command::PairingConfirm(m) => Ok(m),
            _ => unreachable!(),
        }
    }

    /// Waits for `PAIRING_RANDOM`.
    pub(super) fn wait_random(&mut self) -> Result<Nonce> {
        match self.wait_command(Code::PairingRandom)? {
            Command::PairingRandom(n) => Ok(n),
            _ => unreachable!(),
        }
    }

    /// Waits for `PAIRING_PUBLIC_KEY`.
    pub(super) fn wait_public_key(&mut self) -> Result<PublicKey> {
        match self.wait_command(Code::PairingPublicKey)? {
            Command::PairingPublicKey(pk) => Ok(pk),
            _ => unreachable!(),
        }
    }

    /// Waits for `PAIRING_DH_KEY_CHECK`.
    pub(super) fn wait_dh_key_check(&mut self) -> Result<Mac> {
        match self.wait_command(Code::PairingDhKeyCheck)? {
            Command::PairingDhKeyCheck(m) => Ok(m),
            _ => unreachable!(),
        }
    }

    /// Waits for a valid HCI event.
    pub(super) fn wait_hci(&mut self) -> Result<hci::Event> {
        match self.wait_event()? {
            PairingEvent::Exit => Err(Error::Cancelled),
            PairingEvent::HciEvent(raw) => hci::Event::parse(&raw)
                .ok_or_else(|| Error::local(Reason::UnspecifiedReason, "invalid HCI event")),
            PairingEvent::Command(_) | PairingEvent::Ui(_) => Err(Error::local(
                Reason::UnspecifiedReason,
                "expecting HCI event, received something else",
            )),
        }
    }

    /// Waits for the user to accept the pairing prompt.
    fn wait_ui_accept(&mut self) -> Result<()> {
        match self.wait_event()? {
            PairingEvent::Ui(UiAction::PairingAccepted) => Ok(()),
            PairingEvent::Exit => Err(Error::Cancelled),
            _ => Err(Error::local(
                Reason::UnspecifiedReason,
                "expecting pairing consent, received something else",
            )),
        }
    }

    /// Waits for a yes/no numeric comparison answer.
    pub(super) fn wait_ui_confirm(&mut self) -> Result<bool> {
        match self.wait_event()? {
            PairingEvent::Ui(UiAction::ConfirmYesNo(v)) => Ok(v),
            PairingEvent::Exit => Err(Error::Cancelled),
            _ => Err(Error::local(
                Reason::NumericComparisonFailed,
                "expecting numeric comparison answer, received something else",
            )),
        }
    }

    /// Waits for the user-entered passkey. The peer may legitimately send
    /// its first `PAIRING_CONFIRM` while the user is still typing; exactly
    /// one such early arrival is cached for the next [`Self::wait_confirm`].
    pub(super) fn wait_ui_passkey(&mut self) -> Result<u32> {
        let e = match self.wait_event()? {
            PairingEvent::Command(pdu) => match Command::try_from(pdu.as_ref()) {
                Ok(Command::PairingConfirm(m)) if self.cached_confirm.is_none() => {
                    trace!("caching early {}", Code::PairingConfirm);
                    self.cached_confirm = Some(m);
                    self.wait_event()?
                }
                Ok(Command::PairingFailed(reason)) => return Err(Error::Remote(reason)),
                Ok(cmd) => {
                    return Err(Error::local(
                        Reason::UnspecifiedReason,
                        format!("expecting passkey input, received {}", cmd.code()),
                    ))
                }
                Err(r) => {
                    return Err(Error::local(r, "malformed PDU while expecting passkey input"))
                }
            },
            other => other,
        };
        match e {
            PairingEvent::Ui(UiAction::Passkey(v)) => Ok(v),
            PairingEvent::Exit => Err(Error::Cancelled),
            _ => Err(Error::local(
                Reason::PasskeyEntryFailed,
                "expecting passkey input, received something else",
            )),
        }
    }
}
