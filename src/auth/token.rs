//! Cached bearer tokens and the redacted secret wrapper they carry.

pub mod record;
pub mod secret;
