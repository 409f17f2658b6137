//! Marketing channel records and their encrypted gateway credentials.
pub mod encryption;
pub mod models;
pub mod service;
pub mod store;

pub use encryption::ConfigCipher;
pub use models::{ChannelResponse, ChannelStatus, CreateChannelRequest};
pub use service::{ChannelError, ChannelService};
pub use store::{ChannelStore, InMemoryChannelStore};
