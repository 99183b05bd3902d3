//! LLM provider implementations for FBot.
//!
//! All providers implement the `fbot_core::Provider` trait.
//! [`build_provider`] selects and configures one from `AppConfig`.

pub mod factory;
pub mod openai_compat;

pub use factory::build_provider;
pub use openai_compat::OpenAiCompatProvider;
