//! Narration sink that keeps everything it is told

#![allow(dead_code)]

use async_trait::async_trait;
use stak::progress::ProgressCallback;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct RecordingProgress {
    messages: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }

    /// Whether some warning contains `needle`
    pub fn warned(&self, needle: &str) -> bool {
        self.warnings.lock().unwrap().iter().any(|w| w.contains(needle))
    }
}

#[async_trait]
impl ProgressCallback for RecordingProgress {
    async fn on_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    async fn on_warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }
}
