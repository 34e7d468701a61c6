//! Reliable, line-delimited JSON metadata channel

mod channel;
mod message;


pub use channel::{MetadataChannel, MetadataEvent, MetadataStats};
pub use message::MetadataMessage;
