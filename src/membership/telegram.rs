//! Telegram-backed membership lookups and join-request decisions.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, UserId};
use teloxide::{ApiError, RequestError};
use tracing::debug;

use super::MemberStatus;
use crate::services::{ApprovalError, JoinApproval, LookupError, MembershipLookup};

/// Talks to the Bot API directly (no throttle: these are single reads/writes
/// that the caller already rate limits).
#[derive(Clone)]
pub struct TelegramMembership {
    bot: Bot,
}

impl TelegramMembership {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MembershipLookup for TelegramMembership {
    async fn get_status(&self, chat_id: i64, user_id: u64) -> Result<MemberStatus, LookupError> {
        let member = self
            .bot
            .get_chat_member(ChatId(chat_id), UserId(user_id))
            .await
            .map_err(lookup_error)?;

        let status = MemberStatus::from(member.status());
        debug!(chat_id, user_id, %status, "membership lookup");
        Ok(status)
    }
}

#[async_trait]
impl JoinApproval for TelegramMembership {
    async fn approve(&self, chat_id: i64, user_id: u64) -> Result<(), ApprovalError> {
        self.bot
            .approve_chat_join_request(ChatId(chat_id), UserId(user_id))
            .await
            .map(|_| ())
            .map_err(approval_error)
    }

    async fn decline(&self, chat_id: i64, user_id: u64) -> Result<(), ApprovalError> {
        self.bot
            .decline_chat_join_request(ChatId(chat_id), UserId(user_id))
            .await
            .map(|_| ())
            .map_err(approval_error)
    }
}

/// Rough class of a Bot API error description.
#[derive(Debug, PartialEq, Eq)]
enum Failure {
    Permission,
    BadTarget,
    AlreadyHandled,
}

fn classify_description(description: &str) -> Option<Failure> {
    const PERMISSION: &[&str] = &[
        "not enough rights",
        "chat_admin_required",
        "member list is inaccessible",
        "bot was kicked",
        "bot is not a member",
        "need administrator rights",
        "have no rights",
    ];
    const BAD_TARGET: &[&str] = &[
        "chat not found",
        "peer_id_invalid",
        "chat_id_invalid",
        "group chat was upgraded",
    ];
    const HANDLED: &[&str] = &["hide_requester_missing", "user_already_participant"];

    let description = description.to_lowercase();
    let contains_any = |needles: &[&str]| needles.iter().any(|n| description.contains(n));

    if contains_any(HANDLED) {
        Some(Failure::AlreadyHandled)
    } else if contains_any(PERMISSION) {
        Some(Failure::Permission)
    } else if contains_any(BAD_TARGET) {
        Some(Failure::BadTarget)
    } else {
        None
    }
}

fn lookup_error(err: RequestError) -> LookupError {
    let message = err.to_string();
    match &err {
        RequestError::Api(ApiError::ChatNotFound) | RequestError::MigrateToChatId(_) => {
            LookupError::NotFound(message)
        }
        RequestError::Api(_) => match classify_description(&message) {
            Some(Failure::Permission) => LookupError::PermissionDenied(message),
            Some(Failure::BadTarget) => LookupError::NotFound(message),
            _ => LookupError::Transient(message),
        },
        _ => LookupError::Transient(message),
    }
}

fn approval_error(err: RequestError) -> ApprovalError {
    let message = err.to_string();
    match classify_description(&message) {
        Some(Failure::AlreadyHandled) => ApprovalError::AlreadyHandled,
        Some(Failure::Permission) => ApprovalError::PermissionDenied(message),
        _ => ApprovalError::Other(message),
    }
}
