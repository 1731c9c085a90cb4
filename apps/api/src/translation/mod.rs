pub mod backend;
pub mod cache;
pub mod chunking;
pub mod fingerprint;
pub mod handlers;
pub mod in_flight;
pub mod masking;
pub mod models;
pub mod prompts;
pub mod translator;

pub use translator::Translator;
