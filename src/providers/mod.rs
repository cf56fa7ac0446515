//! Connector implementations

pub mod azure_openai;

// Re-export for convenience
pub use azure_openai::AzureOpenAIConnector;
