pub mod epub;
pub mod fallback;
pub mod generator;
pub mod llm;
pub mod parser;
pub mod prompts;
