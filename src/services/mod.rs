//! External service boundaries.
//!
//! The gates and the router only talk to the outside world through these
//! traits. Telegram-backed implementations live in `membership`, HTTP clients
//! live next to this file, and tests plug in their own doubles.

pub mod gemini;
pub mod safe_browsing;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::membership::MemberStatus;

pub use gemini::GeminiClient;
pub use safe_browsing::{SafeBrowsingClient, ScanError};

/// Why a membership lookup failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    /// The bot is not allowed to inspect the target chat (usually: not an admin there).
    #[error("not enough rights to read members of the chat: {0}")]
    PermissionDenied(String),

    /// The target chat does not exist or the bot cannot reach it.
    #[error("target chat not found: {0}")]
    NotFound(String),

    /// The lookup did not finish in time.
    #[error("membership lookup timed out after {0:?}")]
    Timeout(Duration),

    /// Network hiccup, flood control, malformed response.
    #[error("transient lookup failure: {0}")]
    Transient(String),
}

impl LookupError {
    /// A definitively bad target is the only failure not worth retrying.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

/// Why a completion request failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompletionError {
    #[error("completion backend is rate limiting requests")]
    RateLimited,

    #[error("completion backend rejected the credentials: {0}")]
    AuthFailed(String),

    #[error("completion request timed out after {0:?}")]
    Timeout(Duration),

    #[error("completion backend returned no text")]
    EmptyResponse,

    #[error("completion failed: {0}")]
    Unknown(String),
}

/// Why approving or declining a join request failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("not enough rights to manage join requests: {0}")]
    PermissionDenied(String),

    /// Someone (an admin, or a previous update) already handled the request.
    #[error("join request was already handled")]
    AlreadyHandled,

    #[error("join request update failed: {0}")]
    Other(String),
}

/// Looks up a user's membership status in a chat.
#[async_trait]
pub trait MembershipLookup: Send + Sync {
    async fn get_status(&self, chat_id: i64, user_id: u64) -> Result<MemberStatus, LookupError>;
}

/// Opaque text-completion backend.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        system_instruction: &str,
    ) -> Result<String, CompletionError>;
}

/// Approves or declines pending join requests.
#[async_trait]
pub trait JoinApproval: Send + Sync {
    async fn approve(&self, chat_id: i64, user_id: u64) -> Result<(), ApprovalError>;

    async fn decline(&self, chat_id: i64, user_id: u64) -> Result<(), ApprovalError>;
}
