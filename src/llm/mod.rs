pub mod anthropic;
pub mod openai;
pub mod provider;
pub mod structured;

pub use provider::{LLMProviderConfig, MeteredLLM, TokenStream, UsageMeter, LLM, LLMAdapter};
pub use structured::StructuredLLM;
