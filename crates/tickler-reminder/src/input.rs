use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

/// Answer to a single [`InputSource::request_line`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineResponse {
    /// The line the operator typed, without its line terminator.
    pub text: Option<String>,
    /// `true` when the window closed before any text arrived.
    pub timed_out: bool,
}

impl LineResponse {
    pub fn line(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            timed_out: false,
        }
    }

    pub fn timed_out() -> Self {
        Self {
            text: None,
            timed_out: true,
        }
    }

    /// The source has no more input and never will.
    pub fn closed() -> Self {
        Self {
            text: None,
            timed_out: false,
        }
    }
}

/// Bounded request for one line of operator input.
#[async_trait]
pub trait InputSource: Send + Sync {
    /// Show `prompt` and wait at most `timeout` for a line.
    ///
    /// Must return no later than `timeout` after being called, and must not
    /// let a line that arrives afterwards be attributed to this request.
    async fn request_line(&self, prompt: &str, timeout: Duration) -> LineResponse;
}

/// Replays canned answers in order, then reports a timeout for every further
/// request. Records each prompt it was shown.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    answers: Mutex<VecDeque<LineResponse>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedInput {
    pub fn new(answers: impl IntoIterator<Item = LineResponse>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            prompts: Mutex::default(),
        }
    }

    pub fn push(&self, answer: LineResponse) {
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(answer);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn request_line(&self, prompt: &str, _timeout: Duration) -> LineResponse {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(LineResponse::timed_out)
    }
}
