//! Agent definitions: the named configurations (system prompt, tool
//! whitelist, iteration limit) that [`crate::executor::AgentExecutor`]
//! drives one at a time.

mod frontmatter;
mod registry;

pub use registry::{bundled_definitions, AgentDefinition, AgentLoadError, AgentLoadOptions, AgentRegistry};

/// The four roles the orchestrator routes between.
pub const PLANNER: &str = "planner";
pub const QUESTIONER: &str = "questioner";
pub const TINKERER: &str = "tinkerer";
pub const JUDGE: &str = "judge";
