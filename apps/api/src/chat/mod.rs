pub mod handlers;
pub mod history;
