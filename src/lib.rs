pub mod channels;
pub mod server;
pub mod version;
pub mod web;
pub mod webhook;
pub mod zapi;

#[cfg(test)]
mod test_support;
