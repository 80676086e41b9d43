//! Detection of bot/verification walls in engine error output.
//!
//! Extractors signal blocking with fairly stable phrases; matching them here
//! decides whether the extraction fallback chain is worth walking.

/// Whether an extraction error looks like a bot-check or verification wall
/// rather than a hard failure. Only these errors trigger the fallback chain.
pub fn is_verification_block(message: &str) -> bool {
    let lower = message.to_lowercase();

    lower.contains("sign in to confirm")
        || lower.contains("bot")
        || lower.contains("captcha")
        || lower.contains("unusual traffic")
        || lower.contains("automated")
        || lower.contains("confirm you're not a robot")
        || lower.contains("429")
        || lower.contains("too many requests")
}
