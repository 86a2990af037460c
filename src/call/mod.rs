//! Simulated call overlay.
//!
//! `Idle -> Outgoing | Incoming -> Active -> Idle`. Only the duration counter
//! and the control flags are real; no media is captured or transmitted.

pub mod capture;
pub mod signaling;
pub mod ticker;

use std::sync::Arc;

use log::{info, warn};

use crate::api::models::UserSummary;
use crate::error::{ChatError, Result};
use crate::notify::{Notifier, Toast};
use crate::utils::format_clock;
use signaling::{CallKind, CallSignaling, DialOutcome, IncomingCall};
use ticker::Ticker;

pub const PLACEHOLDER_VIDEO_SRC: &str = "/placeholder.svg?height=480&width=640";

#[derive(Debug, Clone, PartialEq)]
pub enum CallPhase {
    Idle,
    Outgoing { kind: CallKind, partner: UserSummary },
    Incoming { kind: CallKind, caller: UserSummary },
    Active { kind: CallKind, partner: UserSummary },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallControls {
    pub muted: bool,
    pub video_enabled: bool,
    pub fullscreen: bool,
}

impl Default for CallControls {
    fn default() -> Self {
        Self { muted: false, video_enabled: true, fullscreen: false }
    }
}

pub struct CallController {
    phase: CallPhase,
    controls: CallControls,
    ticker: Option<Ticker>,
    video_source: Option<&'static str>,
    chat_name: String,
    signaling: Arc<dyn CallSignaling>,
    notifier: Arc<dyn Notifier>,
}

impl CallController {
    pub fn new(signaling: Arc<dyn CallSignaling>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            phase: CallPhase::Idle,
            controls: CallControls::default(),
            ticker: None,
            video_source: None,
            chat_name: "Chat".to_string(),
            signaling,
            notifier,
        }
    }

    pub fn set_chat_name(&mut self, name: impl Into<String>) {
        self.chat_name = name.into();
    }

    pub fn phase(&self) -> &CallPhase {
        &self.phase
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, CallPhase::Idle)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, CallPhase::Active { .. })
    }

    pub fn controls(&self) -> CallControls {
        self.controls
    }

    pub fn video_source(&self) -> Option<&'static str> {
        self.video_source
    }

    pub fn signaling(&self) -> Arc<dyn CallSignaling> {
        self.signaling.clone()
    }

    pub fn duration_secs(&self) -> u64 {
        self.ticker.as_ref().map(Ticker::elapsed).unwrap_or(0)
    }

    pub fn duration_label(&self) -> String {
        format_clock(self.duration_secs())
    }

    /// Idle -> Outgoing. Group conversations and missing partners are refused.
    pub fn begin_outgoing(&mut self, partner: Option<&UserSummary>, is_group: bool, kind: CallKind) -> Result<()> {
        if is_group {
            self.notifier.notify(Toast::error("Group calls are not supported in this version."));
            return Err(ChatError::validation("Group calls not supported"));
        }
        if !self.is_idle() {
            return Err(ChatError::validation("A call is already in progress"));
        }
        let partner = partner
            .cloned()
            .ok_or_else(|| ChatError::validation("Nobody to call in this conversation"))?;
        self.phase = CallPhase::Outgoing { kind, partner };
        Ok(())
    }

    /// Outgoing -> Active once the signaling side answers.
    pub async fn place_call(&mut self, partner: Option<&UserSummary>, is_group: bool, kind: CallKind) -> Result<()> {
        self.begin_outgoing(partner, is_group, kind)?;
        let CallPhase::Outgoing { partner, .. } = self.phase.clone() else {
            return Ok(());
        };
        let outcome = self.signaling.dial(&partner, kind).await;
        self.complete_dial(outcome)
    }

    pub fn complete_dial(&mut self, outcome: Result<DialOutcome>) -> Result<()> {
        let CallPhase::Outgoing { kind, partner } = self.phase.clone() else {
            return Err(ChatError::validation("No outgoing call"));
        };
        match outcome {
            Ok(DialOutcome::Connected) => {
                self.activate(kind, partner);
                Ok(())
            }
            Ok(DialOutcome::Declined) => {
                self.phase = CallPhase::Idle;
                self.notifier.notify(Toast::info(
                    "Call declined",
                    format!("{} did not answer", partner.fullname),
                ));
                Ok(())
            }
            Err(e) => {
                self.phase = CallPhase::Idle;
                self.notifier.notify(Toast::failure("Failed to start call", &e));
                Err(e)
            }
        }
    }

    /// Idle -> Incoming. Offers that arrive while busy are dropped.
    pub fn offer_incoming(&mut self, call: IncomingCall) -> bool {
        if !self.is_idle() {
            warn!("dropping incoming call from {} while busy", call.caller.id);
            return false;
        }
        self.phase = CallPhase::Incoming { kind: call.kind, caller: call.caller };
        true
    }

    pub fn accept(&mut self) -> Result<()> {
        let CallPhase::Incoming { kind, caller } = self.phase.clone() else {
            return Err(ChatError::validation("No incoming call"));
        };
        self.activate(kind, caller);
        Ok(())
    }

    pub fn reject(&mut self) {
        if let CallPhase::Incoming { caller, .. } = &self.phase {
            let name = if caller.fullname.is_empty() { "Unknown" } else { caller.fullname.as_str() };
            self.notifier.notify(Toast::info(
                "Call rejected",
                format!("You rejected a call from {}", name),
            ));
            self.phase = CallPhase::Idle;
        }
    }

    fn activate(&mut self, kind: CallKind, partner: UserSummary) {
        self.ticker = Some(Ticker::every_second());
        self.video_source = match kind {
            CallKind::Video => Some(PLACEHOLDER_VIDEO_SRC),
            CallKind::Audio => None,
        };
        self.notifier.notify(Toast::info(
            format!("{} call started", kind.label()),
            format!("Call with {} started", self.chat_name),
        ));
        info!("{:?} call with {} active", kind, partner.id);
        self.phase = CallPhase::Active { kind, partner };
    }

    /// Back to Idle from any phase; returns the call duration in seconds.
    pub async fn end(&mut self) -> u64 {
        let was_connected = self.is_connected();
        let duration = self.finish();
        if was_connected {
            if let Err(e) = self.signaling.hang_up().await {
                warn!("hang up failed: {}", e);
            }
        }
        duration
    }

    /// Local half of [`end`](Self::end); the signaling side is not told.
    pub fn finish(&mut self) -> u64 {
        let was_connected = self.is_connected();
        let duration = self.reset();
        if was_connected {
            self.notifier.notify(Toast::info(
                "Call ended",
                format!("Call duration: {}", format_clock(duration)),
            ));
        }
        duration
    }

    fn is_connected(&self) -> bool {
        matches!(self.phase, CallPhase::Active { .. } | CallPhase::Outgoing { .. })
    }

    fn reset(&mut self) -> u64 {
        let duration = self.ticker.take().map(Ticker::stop).unwrap_or(0);
        self.phase = CallPhase::Idle;
        self.controls = CallControls::default();
        self.video_source = None;
        duration
    }

    pub fn toggle_mute(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.controls.muted = !self.controls.muted;
        let toast = if self.controls.muted {
            Toast::info("Microphone muted", "Others cannot hear you")
        } else {
            Toast::info("Microphone enabled", "Others can now hear you")
        };
        self.notifier.notify(toast);
        true
    }

    pub fn toggle_video(&mut self) -> bool {
        if !matches!(self.phase, CallPhase::Active { kind: CallKind::Video, .. }) {
            return false;
        }
        self.controls.video_enabled = !self.controls.video_enabled;
        let toast = if self.controls.video_enabled {
            Toast::info("Camera enabled", "Others can now see you")
        } else {
            Toast::info("Camera disabled", "Others cannot see you")
        };
        self.notifier.notify(toast);
        true
    }

    pub fn toggle_fullscreen(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.controls.fullscreen = !self.controls.fullscreen;
        true
    }
}
