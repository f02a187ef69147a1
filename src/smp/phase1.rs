use super::*;

/// Association model selected from the exchanged feature pair
/// ([Vol 3] Part H, Section 2.3.5.1).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(clippy::exhaustive_enums)]
pub enum AssocModel {
    JustWorks,
    NumericComparison,
    PasskeyEntry(PasskeyLayout),
    OutOfBand,
}

impl AssocModel {
    /// Returns whether the model provides MITM protection.
    #[inline]
    #[must_use]
    pub const fn authenticated(self) -> bool {
        !matches!(self, Self::JustWorks)
    }
}

/// Display/input assignment for the Passkey Entry protocol.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(clippy::exhaustive_enums)]
pub enum PasskeyLayout {
    /// The initiator displays the passkey and the responder enters it.
    InitiatorDisplays,
    /// The responder displays the passkey and the initiator enters it.
    ResponderDisplays,
    /// Both sides enter the same passkey.
    BothInput,
}

/// Negotiated pairing features. Computed identically by both peers from the
/// verbatim (request, response) pair, which is preserved for the `c1` and
/// `f6` functions.
#[derive(Clone, Copy, Debug)]
pub(super) struct Features {
    pub preq: PairingParams,
    pub pres: PairingParams,
    pub secure: bool,
    pub model: AssocModel,
    pub key_size: u8,
    /// Keys the local device distributes during Phase 3.
    pub send: KeyDist,
    /// Keys the local device receives during Phase 3.
    pub recv: KeyDist,
}

/// Selects the association model from the exchanged feature pair. Pure and
/// symmetric over its inputs, so initiator and responder always agree
/// ([Vol 3] Part H, Section 2.3.5.1, Table 2.8).
#[must_use]
pub fn association_model(
    secure: bool,
    preq: &PairingParams,
    pres: &PairingParams,
) -> AssocModel {
    use {AssocModel::*, IoCap::*, PasskeyLayout::*};
    // Secure Connections uses OOB if either side has the peer's OOB data;
    // legacy pairing needs it on both sides.
    let oob = if secure {
        preq.oob_data || pres.oob_data
    } else {
        preq.oob_data && pres.oob_data
    };
    if oob {
        return OutOfBand;
    }
    if !preq.mitm() && !pres.mitm() {
        return JustWorks;
    }
    match (preq.io_cap, pres.io_cap) {
        (NoInputNoOutput, _) | (_, NoInputNoOutput) => JustWorks,
        (DisplayOnly, KeyboardOnly | KeyboardDisplay) | (DisplayYesNo, KeyboardOnly) => {
            PasskeyEntry(InitiatorDisplays)
        }
        (DisplayYesNo | KeyboardDisplay, DisplayYesNo | KeyboardDisplay) if secure => {
            NumericComparison
        }
        (DisplayYesNo, KeyboardDisplay) | (KeyboardDisplay, KeyboardOnly | KeyboardDisplay) => {
            PasskeyEntry(InitiatorDisplays)
        }
        (KeyboardOnly, KeyboardOnly) => PasskeyEntry(BothInput),
        (KeyboardOnly, DisplayOnly | DisplayYesNo | KeyboardDisplay)
        | (KeyboardDisplay, DisplayOnly | DisplayYesNo) => PasskeyEntry(ResponderDisplays),
        _ => JustWorks,
    }
}

impl PairingSession {
    /// Runs Phase 1: exchanges `PAIRING_REQUEST`/`PAIRING_RESPONSE` and
    /// negotiates the association model and key distribution
    /// ([Vol 3] Part H, Section 2.3.5.1).
    pub(super) fn exchange_features(&mut self) -> Result<Features> {
        let (preq, pres) = if self.is_initiator() {
            let req = self.params.features;
            self.send(&Command::PairingRequest(req));
            let rsp = match self.wait_command(Code::PairingResponse)? {
                Command::PairingResponse(v) => v,
                _ => unreachable!(),
            };
            (req, rsp)
        } else {
            let req = self.params.peer_request.ok_or_else(|| {
                Error::local(
                    Reason::UnspecifiedReason,
                    "responder session has no pairing request",
                )
            })?;
            let rsp = self.params.features;
            self.send(&Command::PairingResponse(rsp));
            (req, rsp)
        };
        self.negotiate(preq, pres)
    }

    fn negotiate(&self, preq: PairingParams, pres: PairingParams) -> Result<Features> {
        let secure = preq.sc() && pres.sc();
        let model = association_model(secure, &preq, &pres);
        if model == AssocModel::JustWorks && (preq.mitm() || pres.mitm()) {
            return Err(Error::local(
                Reason::AuthenticationRequirements,
                "MITM required but IO capabilities only allow Just Works",
            ));
        }
        let key_size = preq.max_key_len.min(pres.max_key_len);
        if key_size < 7 {
            return Err(Error::local(
                Reason::EncryptionKeySize,
                format!("negotiated key size {key_size} is below the minimum of 7"),
            ));
        }
        let mut initiator_keys = preq.initiator_keys & pres.initiator_keys;
        let mut responder_keys = preq.responder_keys & pres.responder_keys;
        if secure {
            // The LTK is derived, never distributed, under Secure
            // Connections.
            initiator_keys.remove(KeyDist::ENC);
            responder_keys.remove(KeyDist::ENC);
        }
        let (send, recv) = if self.is_initiator() {
            (initiator_keys, responder_keys)
        } else {
            (responder_keys, initiator_keys)
        };
        Ok(Features {
            preq,
            pres,
            secure,
            model,
            key_size,
            send,
            recv,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(io_cap: IoCap, mitm: bool, sc: bool, oob: bool) -> PairingParams {
        let mut auth_req = AuthReq::BONDING;
        auth_req.set(AuthReq::MITM, mitm);
        auth_req.set(AuthReq::SC, sc);
        PairingParams {
            io_cap,
            oob_data: oob,
            auth_req,
            max_key_len: 16,
            initiator_keys: KeyDist::all(),
            responder_keys: KeyDist::all(),
        }
    }

    #[test]
    fn no_mitm_is_just_works() {
        use IoCap::*;
        for a in [DisplayOnly, DisplayYesNo, KeyboardOnly, NoInputNoOutput, KeyboardDisplay] {
            for b in [DisplayOnly, DisplayYesNo, KeyboardOnly, NoInputNoOutput, KeyboardDisplay] {
                let (preq, pres) = (params(a, false, true, false), params(b, false, true, false));
                assert_eq!(
                    association_model(true, &preq, &pres),
                    AssocModel::JustWorks
                );
            }
        }
    }

    #[test]
    fn oob_precedence() {
        // SC: one side suffices. Legacy: both sides required.
        let with = params(IoCap::DisplayYesNo, true, true, true);
        let without = params(IoCap::DisplayYesNo, true, true, false);
        assert_eq!(association_model(true, &with, &without), AssocModel::OutOfBand);
        assert_eq!(association_model(false, &with, &without), AssocModel::NumericComparison);
        assert_eq!(association_model(false, &with, &with), AssocModel::OutOfBand);
    }

    #[test]
    fn io_matrix_secure() {
        use {AssocModel::*, IoCap::*, PasskeyLayout::*};
        let m = |a, b| {
            association_model(true, &params(a, true, true, false), &params(b, true, true, false))
        };
        assert_eq!(m(NoInputNoOutput, NoInputNoOutput), JustWorks);
        assert_eq!(m(DisplayOnly, DisplayOnly), JustWorks);
        assert_eq!(m(DisplayOnly, KeyboardOnly), PasskeyEntry(InitiatorDisplays));
        assert_eq!(m(DisplayOnly, KeyboardDisplay), PasskeyEntry(InitiatorDisplays));
        assert_eq!(m(DisplayYesNo, DisplayYesNo), NumericComparison);
        assert_eq!(m(DisplayYesNo, KeyboardDisplay), NumericComparison);
        assert_eq!(m(KeyboardDisplay, KeyboardDisplay), NumericComparison);
        assert_eq!(m(KeyboardOnly, KeyboardOnly), PasskeyEntry(BothInput));
        assert_eq!(m(KeyboardOnly, DisplayOnly), PasskeyEntry(ResponderDisplays));
        assert_eq!(m(KeyboardDisplay, DisplayOnly), PasskeyEntry(ResponderDisplays));
        assert_eq!(m(KeyboardDisplay, KeyboardOnly), PasskeyEntry(InitiatorDisplays));
    }

    #[test]
    fn io_matrix_legacy() {
        use {AssocModel::*, IoCap::*, PasskeyLayout::*};
        let m = |a, b| {
            association_model(
                false,
                &params(a, true, false, false),
                &params(b, true, false, false),
            )
        };
        // Numeric comparison degrades to Just Works or Passkey Entry.
        assert_eq!(m(DisplayYesNo, DisplayYesNo), JustWorks);
        assert_eq!(m(DisplayYesNo, KeyboardDisplay), PasskeyEntry(InitiatorDisplays));
        assert_eq!(m(KeyboardDisplay, DisplayYesNo), PasskeyEntry(ResponderDisplays));
        assert_eq!(m(KeyboardDisplay, KeyboardDisplay), PasskeyEntry(InitiatorDisplays));
    }

    #[test]
    fn model_is_deterministic_and_symmetric() {
        use IoCap::*;
        for secure in [false, true] {
            for a in [DisplayOnly, DisplayYesNo, KeyboardOnly, NoInputNoOutput, KeyboardDisplay] {
                for b in [DisplayOnly, DisplayYesNo, KeyboardOnly, NoInputNoOutput, KeyboardDisplay]
                {
                    let (preq, pres) =
                        (params(a, true, secure, false), params(b, true, secure, false));
                    let m = association_model(secure, &preq, &pres);
                    // Same inputs, same output, on every evaluation.
                    assert_eq!(m, association_model(secure, &preq, &pres));
                }
            }
        }
    }
}
