//! Decides whether an inbound chat message is worth handing to the handler.

use std::fmt;

use concierge_core::DEFAULT_HELP_KEYWORDS;
use tracing::{debug, warn};

use crate::model::ChatEvent;
use crate::rest::PlatformApi;

/// Lowercased help vocabulary matched as substrings.
#[derive(Debug, Clone)]
pub struct HelpVocabulary {
    keywords: Vec<String>,
}

impl HelpVocabulary {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, content: &str) -> bool {
        let content = content.to_lowercase();
        self.keywords.iter().any(|k| content.contains(k.as_str()))
    }
}

impl Default for HelpVocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_HELP_KEYWORDS.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriageSignals {
    pub mentions_bot: bool,
    pub replies_to_bot: bool,
    pub keyword_match: bool,
}

impl TriageSignals {
    pub fn any(&self) -> bool {
        self.mentions_bot || self.replies_to_bot || self.keyword_match
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    BotAuthor,
    NoGuild,
    EmptyContent,
    NoSignal,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::BotAuthor => "authored by a bot",
            Self::NoGuild => "not in a guild",
            Self::EmptyContent => "empty content",
            Self::NoSignal => "no mention, reply or help keyword",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriageDecision {
    Process(TriageSignals),
    Drop(DropReason),
}

impl TriageDecision {
    pub fn should_process(&self) -> bool {
        matches!(self, Self::Process(_))
    }
}

/// Checks that need no network access, in order.
pub fn prefilter(event: &ChatEvent) -> Option<DropReason> {
    if event.author.is_bot() {
        return Some(DropReason::BotAuthor);
    }
    if event.guild_id.is_none() {
        return Some(DropReason::NoGuild);
    }
    if event.content.trim().is_empty() {
        return Some(DropReason::EmptyContent);
    }
    None
}

/// Whether the message replies to one of the bot's own messages. Lookup
/// failures count as "no".
pub async fn replies_to_bot(event: &ChatEvent, bot_id: &str, api: &dyn PlatformApi) -> bool {
    let Some((channel_id, message_id)) = event.reply_target() else {
        return false;
    };
    match api.fetch_message(channel_id, message_id).await {
        Ok(referenced) => referenced.author.id == bot_id,
        Err(e) => {
            warn!(
                channel_id,
                message_id,
                error = %e,
                "Failed to look up referenced message"
            );
            false
        }
    }
}

pub async fn triage(
    event: &ChatEvent,
    bot_id: &str,
    api: &dyn PlatformApi,
    vocabulary: &HelpVocabulary,
) -> TriageDecision {
    if let Some(reason) = prefilter(event) {
        return TriageDecision::Drop(reason);
    }

    let signals = TriageSignals {
        mentions_bot: event.mentions_user(bot_id),
        replies_to_bot: replies_to_bot(event, bot_id, api).await,
        keyword_match: vocabulary.matches(&event.content),
    };
    debug!(message_id = %event.id, ?signals, "Triage signals");

    if signals.any() {
        TriageDecision::Process(signals)
    } else {
        TriageDecision::Drop(DropReason::NoSignal)
    }
}
