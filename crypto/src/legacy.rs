use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{debug_secret, Addr, Key, Mac, Passkey};

/// Temporary key for LE legacy pairing ([Vol 3] Part H, Section 2.3.5.2).
///
/// The TK keys the `c1` and `s1` functions. Its value depends on the pairing
/// method: zero for Just Works, the passkey for Passkey Entry, and a shared
/// 128-bit random value for OOB.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
#[must_use]
#[repr(transparent)]
pub struct TemporaryKey(u128);

debug_secret!(TemporaryKey);

impl TemporaryKey {
    /// Returns the all-zero TK used by Just Works.
    #[inline(always)]
    pub const fn just_works() -> Self {
        Self(0)
    }

    /// Creates a TK from a passkey.
    #[inline(always)]
    pub fn from_passkey(passkey: Passkey) -> Self {
        Self(u128::from(passkey))
    }

    /// Creates a TK from a shared 128-bit OOB value.
    #[inline(always)]
    pub const fn from_oob(v: u128) -> Self {
        Self(v)
    }

    /// Generates the legacy confirm value
    /// `c1(k, r, preq, pres, iat, ia, rat, ra)` ([Vol 3] Part H,
    /// Section 2.2.3). `preq` and `pres` are the complete 7-octet Pairing
    /// Request and Pairing Response PDUs in transmission order, including the
    /// command code.
    pub fn c1(&self, r: u128, preq: &[u8; 7], pres: &[u8; 7], ia: Addr, ra: Addr) -> Mac {
        // p1 = pres || preq || rat' || iat', p2 = padding || ia || ra, both
        // with the LSB at the highest index for AES.
        let mut p1 = [0; 16];
        for i in 0..7 {
            p1[i] = pres[6 - i];
            p1[7 + i] = preq[6 - i];
        }
        p1[14] = ra.typ();
        p1[15] = ia.typ();
        let mut p2 = [0; 16];
        p2[4..10].copy_from_slice(&ia.0[1..]);
        p2[10..].copy_from_slice(&ra.0[1..]);

        let k = Key::new(self.0);
        let mut b = r.to_be_bytes();
        for i in 0..16 {
            b[i] ^= p1[i];
        }
        b = k.encrypt_block(b);
        for i in 0..16 {
            b[i] ^= p2[i];
        }
        Mac::from(u128::from_be_bytes(k.encrypt_block(b)))
    }

    /// Generates the short-term key `s1(k, r1, r2)` from the responder and
    /// initiator random values ([Vol 3] Part H, Section 2.2.4).
    pub fn s1(&self, r1: u128, r2: u128) -> ShortTermKey {
        #[allow(clippy::cast_possible_truncation)]
        let (r1, r2) = (r1 as u64, r2 as u64);
        let mut b = [0; 16];
        b[..8].copy_from_slice(&r1.to_be_bytes());
        b[8..].copy_from_slice(&r2.to_be_bytes());
        ShortTermKey(u128::from_be_bytes(Key::new(self.0).encrypt_block(b)))
    }
}

/// Short-term key generated by [`TemporaryKey::s1`] and used to encrypt the
/// link until key distribution completes.
#[derive(Clone, Copy, Eq, PartialEq)]
#[must_use]
#[repr(transparent)]
pub struct ShortTermKey(pub u128);

debug_secret!(ShortTermKey);

impl ShortTermKey {
    /// Returns the key as a little-endian array.
    #[inline(always)]
    #[must_use]
    pub const fn to_le_bytes(self) -> [u8; 16] {
        self.0.to_le_bytes()
    }

    /// Reduces the key to `len` octets by zeroing the most significant
    /// octets ([Vol 3] Part H, Section 2.3.4).
    #[inline]
    pub const fn shorten(self, len: u8) -> Self {
        Self(crate::shorten(self.0, len))
    }
}
