use regex::Regex;

use crate::Result;

/// Test page that every region sends out regularly.
pub const TEST_PAGE_MESSAGE: &str = "TESTOPROEP MOB";
/// Word that marks a message as a test call.
pub const TEST_WORD: &str = "test";

/// Decides which messages are noise and should be left out of any analysis.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    exact: Vec<String>,
    words: Vec<Regex>,
}

impl MessageFilter {
    /// Drops the periodic test page and anything that mentions the word "test".
    pub fn test_calls() -> Result<Self> {
        MessageFilter::default()
            .exclude_exact(TEST_PAGE_MESSAGE)
            .exclude_word(TEST_WORD)
    }

    /// Drops messages equal to `message`.
    pub fn exclude_exact(mut self, message: impl Into<String>) -> Self {
        self.exact.push(message.into());
        self
    }

    /// Drops messages containing `word` as a whole word, ignoring case.
    /// "Test: run" and "test bla" contain the word, "TESTOPROEP" and "contest" do not.
    pub fn exclude_word(mut self, word: &str) -> Result<Self> {
        let pattern = format!(r"(?i)\b{}\b", regex::escape(word));
        self.words.push(Regex::new(&pattern)?);
        Ok(self)
    }

    pub fn is_excluded(&self, message: &str) -> bool {
        self.exact.iter().any(|m| m == message) || self.words.iter().any(|w| w.is_match(message))
    }

    pub fn keeps(&self, message: &str) -> bool {
        !self.is_excluded(message)
    }
}
