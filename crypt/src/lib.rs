//! IrisCrypt: encrypted module packages bound to serial-number auth tokens,
//! and a probe for a runtime's `NODE_MODULE_VERSION`.
//!
//! The pieces line up as: [`auth`] derives a token from a serial number,
//! [`package`] seals module sources with it and resolves them again after
//! loading, [`modver`] reads the ABI version a native build should target.

pub mod auth;
pub mod base32;
pub mod config;
pub mod crypto;
pub mod logging;
pub mod modver;
pub mod package;

pub use auth::AuthToken;
pub use package::{Module, Package};
