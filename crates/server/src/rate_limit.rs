//! Per-connection rate limiting (§5 "Concurrency & Resource Model").
//!
//! Two independent sliding one-second windows, one for message count and
//! one for audio byte volume, following the `VecDeque<Instant>` windowing
//! idiom used for channel throttling elsewhere in the stack.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use thiserror::Error;
use voice_agent_config::RateLimitConfig;

const WINDOW: Duration = Duration::from_secs(1);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("message rate exceeded ({limit} messages/s)")]
    MessagesExceeded { limit: u32 },

    #[error("audio rate exceeded ({limit} bytes/s)")]
    AudioExceeded { limit: u32 },
}

pub struct RateLimiter {
    enabled: bool,
    messages_per_second: u32,
    audio_bytes_per_second: u32,
    message_times: VecDeque<Instant>,
    audio_samples: VecDeque<(Instant, usize)>,
    audio_bytes_in_window: usize,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            messages_per_second: config.messages_per_second,
            audio_bytes_per_second: config.audio_bytes_per_second,
            message_times: VecDeque::new(),
            audio_samples: VecDeque::new(),
            audio_bytes_in_window: 0,
        }
    }

    pub fn check_message(&mut self) -> Result<(), RateLimitError> {
        if !self.enabled {
            return Ok(());
        }
        let now = Instant::now();
        prune(&mut self.message_times, now);
        if self.message_times.len() as u32 >= self.messages_per_second {
            return Err(RateLimitError::MessagesExceeded {
                limit: self.messages_per_second,
            });
        }
        self.message_times.push_back(now);
        Ok(())
    }

    pub fn check_audio(&mut self, bytes: usize) -> Result<(), RateLimitError> {
        if !self.enabled {
            return Ok(());
        }
        let now = Instant::now();
        while let Some((t, n)) = self.audio_samples.front() {
            if now.duration_since(*t) > WINDOW {
                self.audio_bytes_in_window -= n;
                self.audio_samples.pop_front();
            } else {
                break;
            }
        }
        if self.audio_bytes_in_window + bytes > self.audio_bytes_per_second as usize {
            return Err(RateLimitError::AudioExceeded {
                limit: self.audio_bytes_per_second,
            });
        }
        self.audio_samples.push_back((now, bytes));
        self.audio_bytes_in_window += bytes;
        Ok(())
    }
}

fn prune(times: &mut VecDeque<Instant>, now: Instant) {
    while let Some(t) = times.front() {
        if now.duration_since(*t) > WINDOW {
            times.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(messages_per_second: u32, audio_bytes_per_second: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            messages_per_second,
            audio_bytes_per_second,
        }
    }

    #[test]
    fn allows_up_to_the_limit() {
        let mut limiter = RateLimiter::new(&config(2, 1000));
        assert!(limiter.check_message().is_ok());
        assert!(limiter.check_message().is_ok());
        assert!(limiter.check_message().is_err());
    }

    #[test]
    fn disabled_limiter_never_rejects() {
        let mut cfg = config(1, 1);
        cfg.enabled = false;
        let mut limiter = RateLimiter::new(&cfg);
        for _ in 0..100 {
            assert!(limiter.check_message().is_ok());
        }
    }

    #[test]
    fn audio_bytes_accumulate_within_window() {
        let mut limiter = RateLimiter::new(&config(100, 1000));
        assert!(limiter.check_audio(600).is_ok());
        assert!(limiter.check_audio(300).is_ok());
        assert!(limiter.check_audio(200).is_err());
    }
}
