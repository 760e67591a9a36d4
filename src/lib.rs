//! burrow: a terminal front-end for a tool-using agent.
//!
//! The agent works inside one workspace directory. Its tools go through a
//! [`sandbox::Sandbox`] that refuses any path resolving outside that root;
//! its raw event stream is normalized by [`agent::translator`] and drawn by
//! [`render`]; conversations persist as JSONL threads in [`store`].

pub mod agent;
pub mod config;
pub mod render;
pub mod sandbox;
pub mod session;
pub mod store;
pub mod tools;

pub use agent::{Agent, AgentEvent, AgentRequest, AgentResult, TurnEvent};
pub use config::Config;
pub use sandbox::{Sandbox, SandboxError, SandboxLimits, SandboxOutput};
pub use session::Session;
pub use store::{ConversationStore, Message, Workspace};
