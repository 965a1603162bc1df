use {
    murmur_whisper::{
        AddressRequest, RevealRequest, Suggestion, UserId, presenter::GENERIC_ERROR_NOTICE,
    },
    teloxide::{
        payloads::{AnswerCallbackQuerySetters, AnswerInlineQuerySetters},
        prelude::*,
        types::{
            InlineKeyboardButton, InlineKeyboardMarkup, InlineQueryResult,
            InlineQueryResultArticle, InputMessageContent, InputMessageContentText, ParseMode,
            User,
        },
    },
    tracing::{debug, warn},
};

use crate::{error::Result, state::RelayState};

/// Label of the reveal button under a whisper card.
pub const VIEW_BUTTON_LABEL: &str = "👁️ View whisper";

/// Answer an inline query with whisper, inbox or help cards.
pub async fn handle_inline_query(query: InlineQuery, state: &RelayState) -> Result<()> {
    state.directory.remember(&query.from);

    let request = AddressRequest {
        raw: query.query.clone(),
        requester_id: user_id(&query.from),
        requester_handle: query.from.username.clone(),
    };
    let batch = state.relay.handle_address(&request).await;
    debug!(
        user_id = query.from.id.0,
        results = batch.results.len(),
        "answering inline query"
    );

    let results: Vec<InlineQueryResult> = batch.results.iter().map(inline_result).collect();
    let answered = state
        .bot
        .answer_inline_query(&query.id, results)
        .cache_time(batch.cache_time_secs)
        .is_personal(batch.personal)
        .await;
    if let Err(e) = answered {
        warn!(error = %e, "inline answer rejected, answering empty");
        state
            .bot
            .answer_inline_query(&query.id, Vec::<InlineQueryResult>::new())
            .cache_time(batch.cache_time_secs)
            .is_personal(true)
            .await?;
    }
    Ok(())
}

/// Answer a button press. Data that is not a reveal token gets a bare
/// acknowledgment so the client stops spinning.
pub async fn handle_callback_query(query: CallbackQuery, state: &RelayState) -> Result<()> {
    state.directory.remember(&query.from);

    let Some(token) = query.data.clone() else {
        state.bot.answer_callback_query(&query.id).await?;
        return Ok(());
    };

    let request = RevealRequest {
        token,
        requester_id: user_id(&query.from),
        requester_handle: query.from.username.clone(),
        chat_id: query.message.as_ref().map(|m| m.chat().id.0),
    };

    let answer = state.bot.answer_callback_query(&query.id);
    match state
        .relay
        .handle_reveal(&request, state.outbound.as_ref())
        .await
    {
        Some(notice) => {
            let answered = answer
                .text(notice.text)
                .show_alert(notice.show_alert)
                .await;
            if let Err(e) = answered {
                // Alerts over 200 characters are rejected by Telegram.
                warn!(error = %e, "reveal answer rejected");
                state
                    .bot
                    .answer_callback_query(&query.id)
                    .text(GENERIC_ERROR_NOTICE)
                    .show_alert(true)
                    .await?;
            }
        },
        None => {
            debug!(data = %request.token, "ignoring foreign callback data");
            answer.await?;
        },
    }
    Ok(())
}

/// Remember the author of a plain message so their handle can be resolved.
pub fn handle_message(msg: &Message, state: &RelayState) {
    if let Some(from) = msg.from.as_ref() {
        state.directory.remember(from);
    }
}

fn user_id(user: &User) -> UserId {
    UserId(user.id.0)
}

fn inline_result(suggestion: &Suggestion) -> InlineQueryResult {
    let content = InputMessageContent::Text(
        InputMessageContentText::new(suggestion.body_html.clone()).parse_mode(ParseMode::Html),
    );
    let mut article =
        InlineQueryResultArticle::new(suggestion.id.clone(), suggestion.title.clone(), content)
            .description(suggestion.description.clone());
    if let Some(token) = &suggestion.reveal_token {
        article = article.reply_markup(InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::callback(VIEW_BUTTON_LABEL, token.clone()),
        ]]));
    }
    InlineQueryResult::Article(article)
}
