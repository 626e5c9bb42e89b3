//! Plugin system for command handlers.
//!
//! Add new plugins by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_plugin;` below
//! 3. Adding the handler to `command_handler()`

pub mod drafts;
pub mod font;
pub mod help;
pub mod start;
pub mod webapp;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::i18n::get_text;
use crate::utils::{html_escape, topic_of};

/// Callback data of the "rules" button under welcome messages.
pub const RULES_CALLBACK: &str = "show_rules";

/// All bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Доступні команди:")]
pub enum Command {
    #[command(description = "Запустити бота")]
    Start,

    #[command(description = "Довідка")]
    Help,

    #[command(description = "Відкрити чернетки")]
    Drafts,

    #[command(description = "Стилізувати текст")]
    Font(String),
}

/// Build the combined command handler.
pub fn command_handler() -> UpdateHandler<anyhow::Error> {
    use dptree::case;

    teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(start::start_handler))
        .branch(case![Command::Help].endpoint(help::help_handler))
        .branch(case![Command::Drafts].endpoint(drafts::drafts_command))
        .branch(case![Command::Font(text)].endpoint(font::font_command))
}

/// Build the callback query handler.
pub fn callback_handler() -> UpdateHandler<anyhow::Error> {
    Update::filter_callback_query().branch(
        dptree::filter(|q: CallbackQuery| q.data.as_deref() == Some(RULES_CALLBACK)).endpoint(rules_callback_handler),
    )
}

/// Post the rules into the chat and thread of the button's message.
async fn rules_callback_handler(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(msg) = q.message.as_ref().and_then(|m| m.regular_message()) else {
        // Too old to be delivered back; the answer above is enough.
        return Ok(());
    };

    let locale = state.locale();
    let text = get_text(locale, "rules.text").replace("{keyword}", &html_escape(&state.config.trigger_keyword));

    let mut request = bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html);
    if let Some(thread) = topic_of(msg) {
        request = request.message_thread_id(thread);
    }
    request.await?;

    Ok(())
}
