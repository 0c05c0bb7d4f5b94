//! Wire record parsing.
//!
//! Everything that touches the remote JSON shapes lives here, so the rest of
//! the crate only ever sees [`Message`](crate::Message) and the typed
//! discovery records.

pub mod discord;

pub use discord::{RawChannel, RawGuild, RawUser, normalize, parse_timestamp, record_id};
