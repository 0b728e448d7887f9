pub mod prompt;
pub mod provider;
pub mod providers;
pub mod sse_parser;
pub mod types;

pub use provider::ActionAdvisor;
pub use providers::openai_compatible::OpenAiCompatibleAdvisor;
