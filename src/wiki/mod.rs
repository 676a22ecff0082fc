//! Wiki open-platform API access

mod client;

pub use client::{ContentSource, WikiClient, WikiSpace};
