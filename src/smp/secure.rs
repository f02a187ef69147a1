use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use blepair_crypto::{DHKey, LongTermKey, Nonce, Passkey, PublicKey, SecretKey};

use super::phase1::Features;
use super::*;

/// Phase 2 authentication state shared by Stage 1 and Stage 2
/// ([Vol 3] Part H, Section 2.3.5.6).
#[derive(Default, Zeroize, ZeroizeOnDrop)]
struct Stage1 {
    na: Nonce,
    nb: Nonce,
    ra: u128,
    rb: u128,
}

impl PairingSession {
    /// Runs Phase 2 for LE Secure Connections and returns the derived LTK,
    /// truncated to the negotiated key size
    /// ([Vol 3] Part H, Section 2.3.5.6).
    pub(super) fn secure_connections(&mut self, feat: &Features) -> Result<LongTermKey> {
        let local_oob_r = self.params.oob.local.as_ref().map(|o| o.random);
        let (sk, pk) = self.local_keypair();
        let remote_pk = self.exchange_public_keys(pk)?;
        let dh_key = sk.dh_key(remote_pk).ok_or_else(|| {
            Error::local(Reason::InvalidParameters, "invalid remote public key")
        })?;
        let (pka, pkb) = if self.is_initiator() {
            (pk, remote_pk)
        } else {
            (remote_pk, pk)
        };

        let s1 = match feat.model {
            AssocModel::NumericComparison | AssocModel::JustWorks => {
                self.sc_numeric(&pka, &pkb, feat.model == AssocModel::NumericComparison)?
            }
            AssocModel::PasskeyEntry(layout) => self.sc_passkey(&pka, &pkb, layout)?,
            AssocModel::OutOfBand => self.sc_oob(local_oob_r.unwrap_or(0))?,
        };
        self.sc_dh_key_check(feat, &dh_key, &s1)
    }

    /// Returns the local ephemeral or pre-advertised OOB key pair.
    fn local_keypair(&mut self) -> (SecretKey, PublicKey) {
        let sk = match self.params.oob.local.take() {
            Some(oob) => oob.secret,
            None => SecretKey::new(),
        };
        let pk = sk.public_key();
        (sk, pk)
    }

    /// Exchanges `PAIRING_PUBLIC_KEY` PDUs, initiator first
    /// ([Vol 3] Part H, Section 2.3.5.6.1).
    fn exchange_public_keys(&mut self, local_pk: PublicKey) -> Result<PublicKey> {
        if self.is_initiator() {
            self.send(&Command::PairingPublicKey(local_pk));
            self.wait_public_key()
        } else {
            let remote = self.wait_public_key()?;
            self.send(&Command::PairingPublicKey(local_pk));
            Ok(remote)
        }
    }

    /// Stage 1 for Numeric Comparison and Just Works
    /// ([Vol 3] Part H, Section 2.3.5.6.2).
    fn sc_numeric(&mut self, pka: &PublicKey, pkb: &PublicKey, compare: bool) -> Result<Stage1> {
        let (na, nb) = if self.is_initiator() {
            let na = Nonce::new();
            let cb = self.wait_confirm()?;
            self.send(&Command::PairingRandom(na));
            let nb = self.wait_random()?;
            if cb != nb.f4(pkb.x(), pka.x(), 0) {
                return Err(Error::local(
                    Reason::ConfirmValueFailed,
                    "confirm value does not match the responder random",
                ));
            }
            (na, nb)
        } else {
            let nb = Nonce::new();
            self.send(&Command::PairingConfirm(nb.f4(pkb.x(), pka.x(), 0)));
            let na = self.wait_random()?;
            self.send(&Command::PairingRandom(nb));
            (na, nb)
        };
        if compare {
            let v = na.g2(pka.x(), pkb.x(), &nb);
            debug!("numeric comparison value: {v}");
            self.params.ui.confirm_numeric(v);
            if !self.wait_ui_confirm()? {
                return Err(Error::local(
                    Reason::NumericComparisonFailed,
                    "user rejected the comparison value",
                ));
            }
        }
        Ok(Stage1 {
            na,
            nb,
            ra: 0,
            rb: 0,
        })
    }

    /// Stage 1 for Passkey Entry: 20 rounds of single-bit commitment
    /// ([Vol 3] Part H, Section 2.3.5.6.3).
    fn sc_passkey(
        &mut self,
        pka: &PublicKey,
        pkb: &PublicKey,
        layout: PasskeyLayout,
    ) -> Result<Stage1> {
        let display = match layout {
            PasskeyLayout::InitiatorDisplays => self.is_initiator(),
            PasskeyLayout::ResponderDisplays => !self.is_initiator(),
            PasskeyLayout::BothInput => false,
        };
        let passkey = if display {
            let passkey = Passkey::new();
            self.params.ui.display_passkey(passkey);
            passkey
        } else {
            self.params.ui.request_passkey();
            let v = self.wait_ui_passkey()?;
            Passkey::from_value(v).ok_or_else(|| {
                Error::local(Reason::PasskeyEntryFailed, "passkey out of range")
            })?
        };

        let (mut na, mut nb) = (Nonce::default(), Nonce::default());
        for i in 0..20 {
            let r = passkey.bit(i);
            if self.is_initiator() {
                na = Nonce::new();
                self.send(&Command::PairingConfirm(na.f4(pka.x(), pkb.x(), r)));
                let cb = self.wait_confirm()?;
                self.send(&Command::PairingRandom(na));
                nb = self.wait_random()?;
                if cb != nb.f4(pkb.x(), pka.x(), r) {
                    return Err(Error::local(
                        Reason::ConfirmValueFailed,
                        format!("passkey confirm mismatch in round {i}"),
                    ));
                }
            } else {
                nb = Nonce::new();
                let ca = self.wait_confirm()?;
                self.send(&Command::PairingConfirm(nb.f4(pkb.x(), pka.x(), r)));
                na = self.wait_random()?;
                if ca != na.f4(pka.x(), pkb.x(), r) {
                    return Err(Error::local(
                        Reason::ConfirmValueFailed,
                        format!("passkey confirm mismatch in round {i}"),
                    ));
                }
                self.send(&Command::PairingRandom(nb));
            }
        }
        let r = u128::from(passkey);
        Ok(Stage1 {
            na,
            nb,
            ra: r,
            rb: r,
        })
    }

    /// Stage 1 for Out-of-Band: the commitment happened over the OOB
    /// channel, so only the nonces are exchanged, initiator first
    /// ([Vol 3] Part H, Section 2.3.5.6.4).
    fn sc_oob(&mut self, local_r: u128) -> Result<Stage1> {
        let remote_r = self.params.oob.remote.unwrap_or(0);
        let (ra, rb) = if self.is_initiator() {
            (local_r, remote_r)
        } else {
            (remote_r, local_r)
        };
        let (na, nb) = if self.is_initiator() {
            let na = Nonce::new();
            self.send(&Command::PairingRandom(na));
            (na, self.wait_random()?)
        } else {
            let na = self.wait_random()?;
            let nb = Nonce::new();
            self.send(&Command::PairingRandom(nb));
            (na, nb)
        };
        Ok(Stage1 { na, nb, ra, rb })
    }

    /// Stage 2: derives MacKey and LTK via `f5` and exchanges
    /// `PAIRING_DH_KEY_CHECK`, initiator first
    /// ([Vol 3] Part H, Section 2.3.5.6.5).
    fn sc_dh_key_check(
        &mut self,
        feat: &Features,
        dh_key: &DHKey,
        s1: &Stage1,
    ) -> Result<LongTermKey> {
        let (a, b) = self.addr_ab();
        let (mac_key, ltk) = dh_key.f5(s1.na, s1.nb, a, b);
        let ea = mac_key.f6(s1.na, s1.nb, s1.rb, feat.preq.f6_io_cap(), a, b);
        let eb = mac_key.f6(s1.nb, s1.na, s1.ra, feat.pres.f6_io_cap(), b, a);
        if self.is_initiator() {
            self.send(&Command::PairingDhKeyCheck(ea));
            if self.wait_dh_key_check()? != eb {
                return Err(Error::local(
                    Reason::DhKeyCheckFailed,
                    "responder DHKey check mismatch",
                ));
            }
        } else {
            if self.wait_dh_key_check()? != ea {
                return Err(Error::local(
                    Reason::DhKeyCheckFailed,
                    "initiator DHKey check mismatch",
                ));
            }
            self.send(&Command::PairingDhKeyCheck(eb));
        }
        Ok(ltk.shorten(feat.key_size))
    }
}
