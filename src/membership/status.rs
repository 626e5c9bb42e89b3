//! Canonical membership status.

use teloxide::types::ChatMemberStatus;

/// Where a user stands in a chat. This is the only status representation the
/// gates compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberStatus {
    Owner,
    Administrator,
    Member,
    Restricted,
    Left,
    Banned,
}

impl MemberStatus {
    /// Whether this status counts as "subscribed".
    ///
    /// Restricted members are not let through: they may not even be in the
    /// chat any more, and the gate fails closed on anything doubtful.
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Owner | Self::Administrator | Self::Member)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Administrator => "administrator",
            Self::Member => "member",
            Self::Restricted => "restricted",
            Self::Left => "left",
            Self::Banned => "banned",
        }
    }
}

impl From<ChatMemberStatus> for MemberStatus {
    #[allow(unreachable_patterns)]
    fn from(status: ChatMemberStatus) -> Self {
        match status {
            ChatMemberStatus::Owner => Self::Owner,
            ChatMemberStatus::Administrator => Self::Administrator,
            ChatMemberStatus::Member => Self::Member,
            ChatMemberStatus::Restricted => Self::Restricted,
            ChatMemberStatus::Left => Self::Left,
            ChatMemberStatus::Banned => Self::Banned,
            // Anything Telegram adds later is treated as "not subscribed".
            _ => Self::Left,
        }
    }
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_set() {
        assert!(MemberStatus::Owner.is_allowed());
        assert!(MemberStatus::Administrator.is_allowed());
        assert!(MemberStatus::Member.is_allowed());

        assert!(!MemberStatus::Restricted.is_allowed());
        assert!(!MemberStatus::Left.is_allowed());
        assert!(!MemberStatus::Banned.is_allowed());
    }

    #[test]
    fn test_from_teloxide_status() {
        assert_eq!(MemberStatus::from(ChatMemberStatus::Owner), MemberStatus::Owner);
        assert_eq!(MemberStatus::from(ChatMemberStatus::Banned), MemberStatus::Banned);
        assert_eq!(MemberStatus::from(ChatMemberStatus::Left), MemberStatus::Left);
    }
}
