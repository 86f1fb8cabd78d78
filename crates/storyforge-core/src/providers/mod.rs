//! Vendor adapters behind one invocation contract
//!
//! Supports OpenAI, Anthropic, Google Gemini, and the OpenAI-compatible
//! endpoints of Mistral and Ollama. Adapters implement [`ProviderAdapter`]
//! and are looked up through a [`ProviderRegistry`] built once at start-up.

pub mod anthropic;
pub mod google;
mod http;
pub mod openai;
pub mod openai_compat;
pub mod prompt;
pub mod registry;
pub mod types;

pub use registry::{ProviderRegistry, ProviderStatus};
pub use types::{ProviderAdapter, ProviderOutput};
