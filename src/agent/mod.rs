// Conversational dispatch
//
// - planner: asks the completion service what the user wants
// - guard: decides whether a proposed translation may start
// - session: per-conversation state machine that owns the translation job
// - tools: translation tool and the registry of other callable tools

pub mod guard;
pub mod planner;
pub mod session;
pub mod state;
pub mod tools;

pub use guard::GuardDecision;
pub use planner::{LlmPlanner, PlannedAction, Planner};
pub use session::{AgentReply, ChatSession, SessionOptions};
pub use state::TranslationState;
pub use tools::{DocumentTranslationTool, ExternalTool, ToolRegistry, UploadAndTranslate};
