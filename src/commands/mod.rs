//! Front-end facing commands.
//!
//! `chat` exposes the session bridge a chat UI (or the bundled line-based
//! binary) drives: start a session, send a message, get a reply.

pub mod chat;

pub use chat::{ChatSession, SessionInfo};
