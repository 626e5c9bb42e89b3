//! Chat membership: status model and Telegram adapters.
//!
//! ## Features
//!
//! - One closed [`MemberStatus`] type shared by every check
//! - `getChatMember` lookups with Bot API errors sorted into
//!   permission / bad-target / transient failures
//! - Join request approve/decline
//!
//! ## Usage
//!
//! ```rust,ignore
//! let membership = TelegramMembership::new(bot.inner().clone());
//!
//! let status = membership.get_status(forum_id, user_id).await?;
//! if status.is_allowed() {
//!     // ...
//! }
//! ```

mod status;
mod telegram;

pub use status::MemberStatus;
pub use telegram::TelegramMembership;
