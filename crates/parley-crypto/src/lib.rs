//! Parley message transform.
//!
//! Message bodies are stored under a fixed-shift substitution cipher. It keeps
//! plaintext out of casual reads of the database file and nothing more: the
//! key is a deployment constant, so treat it as obfuscation, not encryption.

pub mod cipher;

pub use cipher::{DEFAULT_SHIFT, Direction, ShiftCipher};
