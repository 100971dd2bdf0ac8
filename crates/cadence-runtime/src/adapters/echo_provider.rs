//! Development stand-in for the generative response provider.
//!
//! Answers by echoing the latest line of the prompt after a simulated
//! latency, so the work queue and cooldown behave as they would against a
//! slow remote service.

use async_trait::async_trait;
use cadence_core::{ProviderError, ResponseProvider};
use rand::Rng;
use std::time::Duration;

pub struct EchoProvider {
    latency: Duration,
    jitter: Duration,
}

impl EchoProvider {
    pub fn new(latency: Duration, jitter: Duration) -> Self {
        Self { latency, jitter }
    }

    fn delay(&self) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return self.latency;
        }
        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        self.latency + Duration::from_millis(extra)
    }
}

#[async_trait]
impl ResponseProvider for EchoProvider {
    async fn generate(&self, session_key: &str, prompt: &str) -> Result<String, ProviderError> {
        let latest = prompt
            .lines()
            .last()
            .map(|line| line.strip_prefix("user: ").unwrap_or(line).trim())
            .unwrap_or_default();
        if latest.is_empty() {
            return Err(ProviderError::Rejected(format!(
                "empty prompt for session {session_key}"
            )));
        }

        tokio::time::sleep(self.delay()).await;
        Ok(format!("echo: {latest}"))
    }
}
