use tracing::debug;

use blepair_crypto::{IdentityResolvingKey, LongTermKey, SigningKey};

use crate::hci::{EncryptionChange, EncryptionKeyRefresh, EventCode, LongTermKeyRequest};

use super::phase1::Features;
use super::*;

impl PairingSession {
    /// Starts link encryption with `key` and waits for it to become active.
    /// The central issues `HCI_LE_Enable_Encryption`; the peripheral answers
    /// the controller's long-term key request
    /// ([Vol 3] Part H, Section 2.4.4).
    pub(super) fn start_encryption(
        &mut self,
        key: [u8; 16],
        ediv: u16,
        rand: u64,
    ) -> Result<()> {
        let handle = self.params.handle;
        if self.is_initiator() {
            self.params.security.start_encryption(handle, rand, ediv, key);
        } else {
            let req = self.wait_ltk_request()?;
            if req.handle != handle {
                return Err(Error::local(
                    Reason::UnspecifiedReason,
                    "long-term key request for another connection",
                ));
            }
            self.params.security.long_term_key_reply(handle, key);
        }
        self.wait_encrypted()
    }

    /// Waits for `HCI_LE_Long_Term_Key_Request` ([Vol 4] Part E,
    /// Section 7.7.65.5).
    fn wait_ltk_request(&mut self) -> Result<LongTermKeyRequest> {
        let e = self.wait_hci()?;
        LongTermKeyRequest::unpack(&e).ok_or_else(|| {
            Error::local(
                Reason::UnspecifiedReason,
                format!("expecting long-term key request, received {}", e.code()),
            )
        })
    }

    /// Waits for `HCI_Encryption_Change` or
    /// `HCI_Encryption_Key_Refresh_Complete` with a success status.
    fn wait_encrypted(&mut self) -> Result<()> {
        let e = self.wait_hci()?;
        let (status, handle, enabled) = match e.code() {
            EventCode::EncryptionChange => {
                let v = EncryptionChange::unpack(&e).ok_or_else(|| {
                    Error::local(Reason::UnspecifiedReason, "invalid encryption change event")
                })?;
                (v.status, v.handle, v.enabled)
            }
            EventCode::EncryptionKeyRefreshComplete => {
                let v = EncryptionKeyRefresh::unpack(&e).ok_or_else(|| {
                    Error::local(Reason::UnspecifiedReason, "invalid key refresh event")
                })?;
                (v.status, v.handle, true)
            }
            code => {
                return Err(Error::local(
                    Reason::UnspecifiedReason,
                    format!("expecting encryption change, received {code}"),
                ))
            }
        };
        if handle != self.params.handle {
            return Err(Error::local(
                Reason::UnspecifiedReason,
                "encryption change for another connection",
            ));
        }
        if !status.is_ok() {
            return Err(Error::Hci(status));
        }
        if !enabled {
            return Err(Error::local(
                Reason::UnspecifiedReason,
                "encryption disabled after key exchange",
            ));
        }
        debug!("link encrypted");
        Ok(())
    }

    /// Runs Phase 3 in both directions. The central distributes first, then
    /// receives; the peripheral receives first
    /// ([Vol 3] Part H, Section 2.4.3).
    pub(super) fn distribute_keys(
        &mut self,
        feat: &Features,
    ) -> Result<(DistributedKeys, DistributedKeys)> {
        if self.is_initiator() {
            let sent = self.send_keys(feat.send);
            let received = self.receive_keys(feat.recv)?;
            Ok((sent, received))
        } else {
            let received = self.receive_keys(feat.recv)?;
            Ok((self.send_keys(feat.send), received))
        }
    }

    /// Sends the negotiated subset of local keys in the fixed order:
    /// LTK, EDIV/Rand, IRK, identity address, CSRK. Missing keys are
    /// generated randomly.
    fn send_keys(&mut self, mask: KeyDist) -> DistributedKeys {
        let mut sent = DistributedKeys::default();
        if mask.contains(KeyDist::ENC) {
            let enc = self.params.local_keys.enc.unwrap_or_else(|| EncKey {
                ltk: LongTermKey::random(),
                ediv: rand_u16(),
                rand: rand_u64(),
            });
            self.send(&Command::EncryptionInformation(enc.ltk));
            self.send(&Command::CentralIdentification {
                ediv: enc.ediv,
                rand: enc.rand,
            });
            sent.enc = Some(enc);
        }
        if mask.contains(KeyDist::ID) {
            let irk = self
                .params
                .local_keys
                .irk
                .unwrap_or_else(IdentityResolvingKey::random);
            let identity = self
                .params
                .local_keys
                .identity
                .unwrap_or(self.params.local_addr);
            self.send(&Command::IdentityInformation(irk));
            self.send(&Command::IdentityAddressInformation(identity));
            sent.irk = Some(irk);
            sent.identity = Some(identity);
        }
        if mask.contains(KeyDist::SIGN) {
            let csrk = self.params.local_keys.csrk.unwrap_or_else(SigningKey::random);
            self.send(&Command::SigningInformation(csrk));
            sent.csrk = Some(csrk);
        }
        sent
    }

    /// Receives exactly the PDUs implied by `mask`, in the fixed order. Any
    /// missing or out-of-order PDU fails the session.
    fn receive_keys(&mut self, mask: KeyDist) -> Result<DistributedKeys> {
        let mut keys = DistributedKeys::default();
        if mask.contains(KeyDist::ENC) {
            let ltk = match self.wait_command(Code::EncryptionInformation)? {
                Command::EncryptionInformation(k) => k,
                _ => unreachable!(),
            };
            let (ediv, rand) = match self.wait_command(Code::CentralIdentification)? {
                Command::CentralIdentification { ediv, rand } => (ediv, rand),
                _ => unreachable!(),
            };
            keys.enc = Some(EncKey { ltk, ediv, rand });
        }
        if mask.contains(KeyDist::ID) {
            keys.irk = match self.wait_command(Code::IdentityInformation)? {
                Command::IdentityInformation(k) => Some(k),
                _ => unreachable!(),
            };
            keys.identity = match self.wait_command(Code::IdentityAddressInformation)? {
                Command::IdentityAddressInformation(a) => Some(a),
                _ => unreachable!(),
            };
        }
        if mask.contains(KeyDist::SIGN) {
            keys.csrk = match self.wait_command(Code::SigningInformation)? {
                Command::SigningInformation(k) => Some(k),
                _ => unreachable!(),
            };
        }
        Ok(keys)
    }
}

/// Returns a random `u16` from the OS CSPRNG.
fn rand_u16() -> u16 {
    #[allow(clippy::cast_possible_truncation)]
    let v = u128::from(blepair_crypto::Nonce::new()) as u16;
    v
}

/// Returns a random `u64` from the OS CSPRNG.
fn rand_u64() -> u64 {
    #[allow(clippy::cast_possible_truncation)]
    let v = u128::from(blepair_crypto::Nonce::new()) as u64;
    v
}
