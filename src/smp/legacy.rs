use tracing::debug;

use blepair_crypto::{Nonce, Passkey, ShortTermKey, TemporaryKey};

use super::phase1::Features;
use super::*;

impl PairingSession {
    /// Runs Phase 2 for LE legacy pairing and returns the STK, truncated to
    /// the negotiated key size ([Vol 3] Part H, Section 2.3.5.5).
    pub(super) fn legacy_pairing(&mut self, feat: &Features) -> Result<ShortTermKey> {
        let tk = self.legacy_tk(feat)?;
        let preq = feat.preq.pdu_bytes(Code::PairingRequest);
        let pres = feat.pres.pdu_bytes(Code::PairingResponse);
        let (ia, ra) = self.addr_ab();
        let c1 = |r: Nonce| tk.c1(r.0, &preq, &pres, ia, ra);

        let (srand, mrand) = if self.is_initiator() {
            let mrand = Nonce::new();
            self.send(&Command::PairingConfirm(c1(mrand)));
            let sconfirm = self.wait_confirm()?;
            self.send(&Command::PairingRandom(mrand));
            let srand = self.wait_random()?;
            if sconfirm != c1(srand) {
                return Err(Error::local(
                    Reason::ConfirmValueFailed,
                    "responder confirm value mismatch",
                ));
            }
            (srand, mrand)
        } else {
            let srand = Nonce::new();
            let mconfirm = self.wait_confirm()?;
            self.send(&Command::PairingConfirm(c1(srand)));
            let mrand = self.wait_random()?;
            // Verify before revealing our own random value.
            if mconfirm != c1(mrand) {
                return Err(Error::local(
                    Reason::ConfirmValueFailed,
                    "initiator confirm value mismatch",
                ));
            }
            self.send(&Command::PairingRandom(srand));
            (srand, mrand)
        };
        Ok(tk.s1(srand.0, mrand.0).shorten(feat.key_size))
    }

    /// Derives the TK for the selected association model
    /// ([Vol 3] Part H, Section 2.3.5.5).
    fn legacy_tk(&mut self, feat: &Features) -> Result<TemporaryKey> {
        match feat.model {
            // Numeric comparison is not defined for legacy pairing; the
            // model selector degrades it to Just Works.
            AssocModel::JustWorks | AssocModel::NumericComparison => {
                Ok(TemporaryKey::just_works())
            }
            AssocModel::OutOfBand => self.params.oob.legacy_tk.map(TemporaryKey::from_oob).ok_or_else(
                || Error::local(Reason::OobNotAvailable, "no shared legacy OOB key"),
            ),
            AssocModel::PasskeyEntry(layout) => {
                let display = match layout {
                    PasskeyLayout::InitiatorDisplays => self.is_initiator(),
                    PasskeyLayout::ResponderDisplays => !self.is_initiator(),
                    PasskeyLayout::BothInput => false,
                };
                let passkey = if display {
                    let passkey = Passkey::new();
                    debug!("displaying passkey");
                    self.params.ui.display_passkey(passkey);
                    passkey
                } else {
                    self.params.ui.request_passkey();
                    let v = self.wait_ui_passkey()?;
                    Passkey::from_value(v).ok_or_else(|| {
                        Error::local(Reason::PasskeyEntryFailed, "passkey out of range")
                    })?
                };
                Ok(TemporaryKey::from_passkey(passkey))
            }
        }
    }
}
