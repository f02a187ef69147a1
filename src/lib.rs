//! Bluetooth LE Security Manager pairing session engine.
//!
//! One [`smp::PairingSession`] drives a single pairing attempt over an
//! existing LE connection: feature exchange, LE Secure Connections or legacy
//! authentication, transport encryption start, and key distribution
//! ([Vol 3] Part H). The session runs as straight-line blocking code on a
//! caller-owned thread; L2CAP frames, HCI events, and UI answers are posted
//! into it through a [`smp::SessionInput`] handle.

#![warn(missing_debug_implementations)]
#![warn(non_ascii_idents)]
#![warn(unused_extern_crates)]
#![warn(unused_import_braces)]
#![warn(unused_lifetimes)]
#![warn(unused_qualifications)]
#![warn(clippy::cargo)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![allow(clippy::enum_glob_use)]
#![allow(clippy::inline_always)]
#![allow(clippy::module_name_repetitions)]

pub mod hci;
pub mod le;
pub mod smp;

mod util;
