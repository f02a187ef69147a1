use tracing::warn;

use blepair_crypto::{IdentityResolvingKey, LongTermKey, Mac, Nonce, PublicKey, SigningKey};

use crate::le::{Addr, RawAddr};
use crate::util::{LimitedBuf, Packer, Unpacker};

use super::{AuthReq, Code, IoCap, KeyDist, Keypress, Reason};

/// Maximum SMP PDU size over LE, set by the public key exchange
/// ([Vol 3] Part H, Section 3.2).
pub(super) const MTU: usize = 65;

/// SMP command ([Vol 3] Part H, Section 3.3).
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Command {
    PairingRequest(PairingParams),
    PairingResponse(PairingParams),
    PairingConfirm(Mac),
    PairingRandom(Nonce),
    PairingFailed(Reason),
    EncryptionInformation(LongTermKey),
    CentralIdentification { ediv: u16, rand: u64 },
    IdentityInformation(IdentityResolvingKey),
    IdentityAddressInformation(Addr),
    SigningInformation(SigningKey),
    SecurityRequest(AuthReq),
    PairingPublicKey(PublicKey),
    PairingDhKeyCheck(Mac),
    PairingKeypressNotification(Keypress),
}

impl Command {
    /// Returns the command code.
    pub fn code(&self) -> Code {
        use Command::*;
        match *self {
            PairingRequest(_) => Code::PairingRequest,
            PairingResponse(_) => Code::PairingResponse,
            PairingConfirm(_) => Code::PairingConfirm,
            PairingRandom(_) => Code::PairingRandom,
            PairingFailed(_) => Code::PairingFailed,
            EncryptionInformation(_) => Code::EncryptionInformation,
            CentralIdentification { .. } => Code::CentralIdentification,
            IdentityInformation(_) => Code::IdentityInformation,
            IdentityAddressInformation(_) => Code::IdentityAddressInformation,
            SigningInformation(_) => Code::SigningInformation,
            SecurityRequest(_) => Code::SecurityRequest,
            PairingPublicKey(_) => Code::PairingPublicKey,
            PairingDhKeyCheck(_) => Code::PairingDhKeyCheck,
            PairingKeypressNotification(_) => Code::PairingKeypressNotification,
        }
    }

    /// Packs the command into a complete PDU.
    pub fn pack(&self) -> LimitedBuf {
        use Command::*;
        let mut b = LimitedBuf::new(MTU);
        let mut p = b.pack();
        p.u8(self.code());
        match *self {
            PairingRequest(ref v) | PairingResponse(ref v) => v.pack(&mut p),
            PairingConfirm(m) | PairingDhKeyCheck(m) => {
                p.u128(m);
            }
            PairingRandom(n) => {
                p.u128(n);
            }
            PairingFailed(r) => {
                p.u8(r);
            }
            EncryptionInformation(k) => {
                p.u128(k.0);
            }
            CentralIdentification { ediv, rand } => {
                p.u16(ediv).u64(rand);
            }
            IdentityInformation(k) => {
                p.u128(k.0);
            }
            IdentityAddressInformation(a) => {
                p.u8(a.typ()).put(a.raw());
            }
            SigningInformation(k) => {
                p.u128(k.0);
            }
            SecurityRequest(a) => {
                p.u8(a.bits());
            }
            PairingPublicKey(pk) => {
                let (x, y) = pk.to_le_bytes();
                p.put(x).put(y);
            }
            PairingKeypressNotification(k) => {
                p.u8(k);
            }
        }
        b
    }
}

impl TryFrom<&[u8]> for Command {
    type Error = Reason;

    fn try_from(pdu: &[u8]) -> std::result::Result<Self, Reason> {
        // [Vol 3] Part H, Section 3.3
        let mut p = Unpacker::new(pdu);
        if p.is_empty() {
            warn!("Empty PDU");
            return Err(Reason::InvalidParameters);
        }
        let code = p.u8();
        let Ok(code) = Code::try_from(code) else {
            warn!("Unknown command code: {code:#04X}");
            return Err(Reason::CommandNotSupported);
        };
        p.map(|p| match code {
            Code::PairingRequest => PairingParams::unpack(p).map(Self::PairingRequest),
            Code::PairingResponse => PairingParams::unpack(p).map(Self::PairingResponse),
            Code::PairingConfirm => Some(Self::PairingConfirm(p.u128().into())),
            Code::PairingRandom => Some(Self::PairingRandom(p.u128().into())),
            Code::PairingFailed => Reason::try_from(p.u8()).ok().map(Self::PairingFailed),
            Code::EncryptionInformation => {
                Some(Self::EncryptionInformation(LongTermKey(p.u128())))
            }
            Code::CentralIdentification => Some(Self::CentralIdentification {
                ediv: p.u16(),
                rand: p.u64(),
            }),
            Code::IdentityInformation => {
                Some(Self::IdentityInformation(IdentityResolvingKey(p.u128())))
            }
            Code::IdentityAddressInformation => {
                let typ = p.u8();
                let raw: [u8; 6] = p.skip(6)?.as_ref().try_into().ok()?;
                let raw = RawAddr::from(raw);
                match typ {
                    0x00 => Some(Self::IdentityAddressInformation(Addr::Public(raw))),
                    0x01 => Some(Self::IdentityAddressInformation(Addr::Random(raw))),
                    _ => None,
                }
            }
            Code::SigningInformation => Some(Self::SigningInformation(SigningKey(p.u128()))),
            Code::SecurityRequest => {
                Some(Self::SecurityRequest(AuthReq::from_bits_truncate(p.u8())))
            }
            Code::PairingPublicKey => {
                let x: [u8; 32] = p.skip(32)?.as_ref().try_into().ok()?;
                let y: [u8; 32] = p.skip(32)?.as_ref().try_into().ok()?;
                Some(Self::PairingPublicKey(PublicKey::from_le_bytes(x, y)))
            }
            Code::PairingDhKeyCheck => Some(Self::PairingDhKeyCheck(p.u128().into())),
            Code::PairingKeypressNotification => Keypress::try_from(p.u8())
                .ok()
                .map(Self::PairingKeypressNotification),
        })
        .flatten()
        .ok_or_else(|| {
            warn!("Invalid {code} PDU");
            Reason::InvalidParameters
        })
    }
}

/// Pairing request/response parameters ([Vol 3] Part H, Section 3.5.1).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PairingParams {
    /// IO capabilities.
    pub io_cap: IoCap,
    /// OOB authentication data is available flag.
    pub oob_data: bool,
    /// Requested security properties.
    pub auth_req: AuthReq,
    /// Maximum encryption key size that the device can support (7-16 octets).
    pub max_key_len: u8,
    /// Keys that the initiator is requesting to distribute during Phase 3.
    pub initiator_keys: KeyDist,
    /// Keys that the initiator is requesting the responder to distribute
    /// during Phase 3.
    pub responder_keys: KeyDist,
}

impl PairingParams {
    /// Returns whether the Secure Connections flag is set.
    #[inline]
    #[must_use]
    pub fn sc(&self) -> bool {
        self.auth_req.contains(AuthReq::SC)
    }

    /// Returns whether MITM protection is requested.
    #[inline]
    #[must_use]
    pub fn mitm(&self) -> bool {
        self.auth_req.contains(AuthReq::MITM)
    }

    /// Returns the `IOcap` parameter of the `f6` function
    /// ([Vol 3] Part H, Section 2.2.8).
    #[inline]
    pub(super) fn f6_io_cap(&self) -> blepair_crypto::IoCap {
        blepair_crypto::IoCap::new(self.auth_req.bits(), self.oob_data, self.io_cap.into())
    }

    /// Returns the complete 7-octet PDU in transmission order for the `c1`
    /// function ([Vol 3] Part H, Section 2.2.3).
    pub(super) fn pdu_bytes(&self, code: Code) -> [u8; 7] {
        let mut b = LimitedBuf::new(7);
        let mut p = b.pack();
        p.u8(code);
        self.pack(&mut p);
        let mut v = [0; 7];
        v.copy_from_slice(&b);
        v
    }

    #[inline]
    fn pack(&self, p: &mut Packer) {
        p.u8(self.io_cap)
            .bool(self.oob_data)
            .u8(self.auth_req.bits())
            .u8(self.max_key_len)
            .u8(self.initiator_keys.bits())
            .u8(self.responder_keys.bits());
    }

    #[inline]
    fn unpack(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            io_cap: IoCap::try_from(p.u8()).ok()?,
            oob_data: p.bool(),
            auth_req: AuthReq::from_bits_truncate(p.u8()),
            max_key_len: {
                // The negotiated-minimum check maps values below 7 to
                // EncryptionKeySize rather than InvalidParameters.
                let v = p.u8();
                (1..=16).contains(&v).then_some(v)?
            },
            initiator_keys: KeyDist::from_bits_truncate(p.u8()),
            responder_keys: KeyDist::from_bits_truncate(p.u8()),
        })
    }
}
