pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod latex;
pub mod markdown;
pub mod state;
pub mod stream;
pub mod tui;
pub mod ui;

// Re-export main types for convenience
pub use client::InvokeClient;
pub use config::Config;
pub use error::{ChatError, ErrorCategory};
pub use latex::normalize_delimiters;
pub use state::{Action, ChatMessage, ChatRole, ChatState, Command, Submission, SubmissionId};
pub use stream::{StreamEvent, StreamMode};
