pub mod engine;
pub mod handlers;
pub mod phase;
pub mod prompts;
pub mod questions;
pub mod responder;
