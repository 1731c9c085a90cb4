pub mod client;
pub mod handlers;

pub use client::JobsClient;
