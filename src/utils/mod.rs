//! Utility functions.
//!
//! Collection of helper functions used across the bot.

pub mod font;
pub mod reply;
pub mod text;

pub use reply::{ReplyExt, reply_html, reply_plain, topic_of};
pub use text::{MAX_MESSAGE_CHARS, html_escape, mention_html, split_message};

/// Format a wait in minutes for user-facing messages, rounded up.
pub fn minutes_ceil(secs: u64) -> u64 {
    secs.div_ceil(60).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minutes_ceil() {
        assert_eq!(minutes_ceil(0), 1);
        assert_eq!(minutes_ceil(60), 1);
        assert_eq!(minutes_ceil(61), 2);
        assert_eq!(minutes_ceil(300), 5);
    }
}
