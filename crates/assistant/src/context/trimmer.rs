//! History trimming: the sliding window over prior turns.
//!
//! The system context and the new user message are always sent. Prior
//! turns fill what is left of `total − reply_reserve`, newest first, and
//! the first turn that does not fit ends the window. The result is always
//! a contiguous suffix of the history in its original order.

use crate::context::token;
use dayloop_core::message::Message;

/// The window selected by [`HistoryTrimmer::trim`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrimmedHistory<'a> {
    /// Kept turns, oldest first.
    pub turns: &'a [Message],
    /// Turns dropped from the front of the history.
    pub dropped: usize,
    /// Estimated tokens of context + message + kept turns.
    pub used_tokens: usize,
    /// The bound the window was fitted under.
    pub limit: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct HistoryTrimmer {
    total_tokens: usize,
    reply_reserve: usize,
}

impl HistoryTrimmer {
    pub fn new(total_tokens: usize, reply_reserve: usize) -> Self {
        Self {
            total_tokens,
            reply_reserve,
        }
    }

    /// Tokens available for context, message and history.
    pub fn limit(&self) -> usize {
        self.total_tokens.saturating_sub(self.reply_reserve)
    }

    pub fn trim<'a>(&self, context: &str, message: &str, history: &'a [Message]) -> TrimmedHistory<'a> {
        let limit = self.limit();
        let mut used = token::estimate_tokens(context) + token::estimate_tokens(message);
        let mut kept = 0;

        for turn in history.iter().rev() {
            let cost = token::estimate_message_tokens(turn);
            if used + cost >= limit {
                break;
            }
            used += cost;
            kept += 1;
        }

        let dropped = history.len() - kept;
        TrimmedHistory {
            turns: &history[dropped..],
            dropped,
            used_tokens: used,
            limit,
        }
    }
}
