//! Credential material for the journalist API: passphrase hashing,
//! time-based one-time codes, and opaque API tokens.
//!
//! Nothing in here touches source payloads; those arrive pre-encrypted and
//! the server never holds a decryption key.

pub mod otp;
pub mod passphrase;
pub mod token;
