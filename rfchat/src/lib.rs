//! `rfchat`: peer-to-peer line chat over Bluetooth RFCOMM or TCP, with
//! optional password-based encryption.

pub mod config;
pub mod console;
pub mod crypto;
pub mod session;
pub mod transport;
