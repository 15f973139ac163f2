// Post generation: three-stage prompt pipeline and its HTTP entrypoints.
// All model calls go through llm_client; nothing here talks to the provider.

pub mod handlers;
pub mod pipeline;
pub mod prompts;
