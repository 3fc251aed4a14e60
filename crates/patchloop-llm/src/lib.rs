//! # patchloop-llm
//!
//! Generative backends for the patchloop pipeline.
//!
//! Every backend implements [`Generator`], a single `generate(system, user)`
//! capability. Backends are selected by [`create_generator`] from an
//! [`LlmConfig`]; call sites never inspect the concrete type.

mod claude;
mod openai;
mod opencode;
mod output;
mod spawner;
mod traits;
mod yandex;

pub use claude::ClaudeCodeGenerator;
pub use openai::OpenAiGenerator;
pub use opencode::OpenCodeGenerator;
pub use output::ProcessOutput;
pub use spawner::ProcessSpawner;
pub use traits::{BackendKind, Generator, GeneratorError, LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use yandex::YandexGptGenerator;

/// Create a generator for the backend the configuration resolves to
pub fn create_generator(config: &LlmConfig) -> Result<Box<dyn Generator>, GeneratorError> {
    let generator: Box<dyn Generator> = match config.resolved_backend() {
        BackendKind::OpenAi => Box::new(OpenAiGenerator::from_config(config)?),
        BackendKind::YandexGpt => Box::new(YandexGptGenerator::from_config(config)?),
        BackendKind::ClaudeCode => Box::new(ClaudeCodeGenerator::from_config(config)),
        BackendKind::OpenCode => Box::new(OpenCodeGenerator::from_config(config)),
    };
    Ok(generator)
}
