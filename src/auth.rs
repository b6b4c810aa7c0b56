//! Token value types handed out by the cache.

pub mod token;

pub use token::{record::*, secret::*};
