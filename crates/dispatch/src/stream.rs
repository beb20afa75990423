//! Word-level re-chunking for streamed completions.
//!
//! Providers emit deltas at token granularity; the dispatcher smooths them
//! into word-sized chunks (a word plus its trailing whitespace) so consumers
//! render steadily regardless of the backend's tokenizer.

use llm::Usage;

/// Accumulates content deltas and emits whole words.
#[derive(Debug, Default)]
pub struct WordChunks {
    buffer: String,
}

impl WordChunks {
    /// Create an empty chunker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a delta, draining every completed word.
    ///
    /// A word is complete once the character after it arrives, so the
    /// trailing whitespace travels with its word.
    pub fn push(&mut self, delta: &str) -> Vec<String> {
        self.buffer.push_str(delta);

        let mut words = Vec::new();
        loop {
            // Find the first non-whitespace followed by whitespace run end.
            let Some(start) = self.buffer.find(|c: char| !c.is_whitespace()) else {
                break;
            };
            let Some(end) = self.buffer[start..]
                .find(char::is_whitespace)
                .map(|i| start + i)
            else {
                break;
            };
            let Some(next) = self.buffer[end..]
                .find(|c: char| !c.is_whitespace())
                .map(|i| end + i)
            else {
                break;
            };
            words.push(self.buffer[..next].to_owned());
            self.buffer.drain(..next);
        }
        words
    }

    /// Drain whatever remains after the stream ends.
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

/// The outcome of one model round in a streamed call.
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    /// Text produced during this step.
    pub text: String,
    /// Names of tools invoked during this step.
    pub tools_invoked: Vec<compact_str::CompactString>,
    /// Usage reported for this step, when the backend sends it.
    pub usage: Option<Usage>,
}

/// The final outcome of a streamed call.
#[derive(Debug, Clone, Default)]
pub struct FinishOutcome {
    /// Full text across all steps.
    pub text: String,
    /// Usage accumulated across steps.
    pub usage: Option<Usage>,
    /// Number of model rounds taken.
    pub steps: u32,
}
