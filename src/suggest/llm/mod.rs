pub mod client;
pub mod models;
pub mod parse;
pub mod prompts;

pub use client::{GenerationRequest, LlmResponse, OpenRouterClient, TextGenerator};
pub use models::{Model, Usage};
