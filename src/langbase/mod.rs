//! Langbase Pipes client and the text-generation backend seam.

mod backend;
mod client;
mod types;


pub use backend::{CompletionBackend, PipeBackend};
pub use client::LangbaseClient;
pub use types::*;
