//! Mock session prompter

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::service::{DepartureChoice, SessionPrompter};

/// Scriptable prompter recording every message shown to the user
#[derive(Default)]
pub struct MockPrompter {
    confirmations: Mutex<VecDeque<bool>>,
    departures: Mutex<VecDeque<DepartureChoice>>,
    messages: Mutex<Vec<String>>,
    departure_prompts: Mutex<Vec<(String, Vec<DepartureChoice>)>>,
}

impl MockPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answer for the next end confirmation; defaults to yes
    pub fn push_confirmation(&self, answer: bool) {
        self.confirmations.lock().unwrap().push_back(answer);
    }

    /// Queue the choice for the next departure prompt; defaults to `Stay`
    pub fn push_departure(&self, choice: DepartureChoice) {
        self.departures.lock().unwrap().push_back(choice);
    }

    /// Every message shown, in order
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn last_departure_prompt(&self) -> Option<(String, Vec<DepartureChoice>)> {
        self.departure_prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SessionPrompter for MockPrompter {
    async fn confirm_end(&self, message: &str) -> Result<bool> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(self
            .confirmations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(true))
    }

    async fn resolve_departure(
        &self,
        message: &str,
        options: &[DepartureChoice],
    ) -> Result<DepartureChoice> {
        self.messages.lock().unwrap().push(message.to_string());
        self.departure_prompts
            .lock()
            .unwrap()
            .push((message.to_string(), options.to_vec()));
        Ok(self
            .departures
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(DepartureChoice::Stay))
    }
}
