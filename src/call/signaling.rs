use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::api::models::UserSummary;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Audio,
    Video,
}

impl CallKind {
    pub fn label(&self) -> &'static str {
        match self {
            CallKind::Audio => "Voice",
            CallKind::Video => "Video",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncomingCall {
    pub caller: UserSummary,
    pub kind: CallKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialOutcome {
    Connected,
    Declined,
}

/// Call setup with the remote side. A real provider would sit on top of a
/// signaling server; the simulated one only fabricates events locally.
#[async_trait]
pub trait CallSignaling: Send + Sync {
    async fn dial(&self, partner: &UserSummary, kind: CallKind) -> Result<DialOutcome>;

    /// Waits for the next call offered by `partner`. `None` means no call is coming.
    async fn next_incoming(&self, partner: &UserSummary) -> Option<IncomingCall>;

    async fn hang_up(&self) -> Result<()> {
        Ok(())
    }
}

/// Dials always connect; after `delay` an incoming call shows up with
/// probability `chance`, audio or video with equal odds.
pub struct SimulatedSignaling {
    delay: Duration,
    chance: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedSignaling {
    pub fn new() -> Self {
        Self::with_odds(Duration::from_secs(5), 0.3, StdRng::from_entropy())
    }

    pub fn with_odds(delay: Duration, chance: f64, rng: StdRng) -> Self {
        Self { delay, chance: chance.clamp(0.0, 1.0), rng: Mutex::new(rng) }
    }

    pub fn seeded(delay: Duration, chance: f64, seed: u64) -> Self {
        Self::with_odds(delay, chance, StdRng::seed_from_u64(seed))
    }
}

impl Default for SimulatedSignaling {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallSignaling for SimulatedSignaling {
    async fn dial(&self, partner: &UserSummary, kind: CallKind) -> Result<DialOutcome> {
        debug!("simulated {:?} dial to {}", kind, partner.id);
        Ok(DialOutcome::Connected)
    }

    async fn next_incoming(&self, partner: &UserSummary) -> Option<IncomingCall> {
        tokio::time::sleep(self.delay).await;
        let (rings, video) = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            (rng.gen_bool(self.chance), rng.gen_bool(0.5))
        };
        if !rings {
            return None;
        }
        Some(IncomingCall {
            caller: partner.clone(),
            kind: if video { CallKind::Video } else { CallKind::Audio },
        })
    }
}
