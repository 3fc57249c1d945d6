//! Client-side session synchronization for a thread-based chat backend.

pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod render;
pub mod session;
pub mod telemetry;

pub use api::{Backend, ChatReply, ChatRequest, HttpBackend, TokenUsage};
pub use config::ClientConfig;
pub use error::{ClientError, ErrorKind};
pub use history::{ChatMessage, Role, Side, Thread};
pub use render::{MemorySurface, Surface, ThreadEntry, ThreadsView};
pub use session::{Applied, ClientSessionState, Completion, Request, SessionClient, SessionPhase};
