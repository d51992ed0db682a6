//! proctor-generation: Question generator backends.
//!
//! Implements the `QuestionGenerator` trait for Anthropic, OpenAI, and a
//! deterministic mock, and loads the `proctor.toml` configuration that picks
//! between them.

pub mod anthropic;
pub mod config;
pub mod error;
pub mod mock;
pub mod openai;
pub mod prompt;

pub use config::{create_generator, load_config, load_config_from, GeneratorConfig, ProctorConfig};
pub use error::GenerationError;
