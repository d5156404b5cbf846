//! Cross-messenger abstractions.

pub mod port;
