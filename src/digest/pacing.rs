use crate::digest::config::PacingConfig;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceGate {
    ThreadReply,
    Channel,
    Append,
}

/// Request pacing toward rate-limited providers.
pub trait Pacer {
    fn pause(&self, gate: PaceGate);
}

#[derive(Debug, Clone)]
pub struct FixedPacer {
    thread_reply: Duration,
    channel: Duration,
    append: Duration,
}

impl FixedPacer {
    pub fn from_config(cfg: &PacingConfig) -> Self {
        Self {
            thread_reply: Duration::from_millis(cfg.thread_reply_ms),
            channel: Duration::from_millis(cfg.channel_ms),
            append: Duration::from_millis(cfg.append_ms),
        }
    }

    fn delay_for(&self, gate: PaceGate) -> Duration {
        match gate {
            PaceGate::ThreadReply => self.thread_reply,
            PaceGate::Channel => self.channel,
            PaceGate::Append => self.append,
        }
    }
}

impl Pacer for FixedPacer {
    fn pause(&self, gate: PaceGate) {
        let delay = self.delay_for(gate);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacer;

#[cfg(test)]
impl Pacer for NoPacer {
    fn pause(&self, _gate: PaceGate) {}
}
