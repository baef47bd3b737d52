pub mod client;
pub mod prompt;
pub mod summary;
