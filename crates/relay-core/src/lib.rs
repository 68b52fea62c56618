mod engine;
mod error;
mod events;
mod prompts;
mod protocol;
mod runner;
mod session;
mod supervisor;

pub use engine::Engine;
pub use error::EngineError;
pub use events::EngineEvent;
pub use prompts::system_prompt;
pub use protocol::{classify, Directive};
pub use runner::{RunContext, RunOutcome, Runner, ToolLogEntry};
pub use session::ExecutionSession;
pub use supervisor::{
    DelegationRecord, DelegationResult, SupervisionReport, Supervisor,
};
