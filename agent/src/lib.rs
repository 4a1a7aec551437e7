pub mod agent;
pub mod assembler;
pub mod config;
pub mod conversation;
pub mod directory;
pub mod error;
pub mod metrics;
pub mod trace;

pub use agent::AgentClient;
pub use assembler::{
    AgentRuntime, AssemblerOptions, InvokeOutcome, InvokeRequest, ResponseAssembler,
    ResponseStream, StreamSummary, TraceSource,
};
pub use config::ChatConfig;
pub use conversation::{Conversation, ConversationTurn, Role, Selection};
pub use directory::{
    AgentCatalog, AgentDescriptor, AgentDirectory, AgentSummary, AliasSummary, load_agents,
};
pub use error::AgentError;
pub use metrics::InvokeMetrics;
pub use trace::{CompletionEvent, TokenUsage, TraceError, TracePayload};
