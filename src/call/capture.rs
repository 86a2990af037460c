use crate::api::models::FileUpload;
use crate::call::ticker::Ticker;
use crate::error::{ChatError, Result};

/// A finished recording. `audio` stays empty for captures that do not record sound.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub duration_secs: u64,
    pub audio: Option<FileUpload>,
}

pub trait AudioCapture: Send {
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<Recording>;
    fn elapsed_secs(&self) -> u64;
    fn is_recording(&self) -> bool;
}

/// Counts seconds without touching a microphone. Needs a tokio runtime.
#[derive(Default)]
pub struct SimulatedCapture {
    ticker: Option<Ticker>,
}

impl SimulatedCapture {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioCapture for SimulatedCapture {
    fn start(&mut self) -> Result<()> {
        if self.ticker.is_some() {
            return Err(ChatError::validation("Already recording"));
        }
        self.ticker = Some(Ticker::every_second());
        Ok(())
    }

    fn stop(&mut self) -> Result<Recording> {
        let ticker = self
            .ticker
            .take()
            .ok_or_else(|| ChatError::validation("Not recording"))?;
        Ok(Recording { duration_secs: ticker.stop(), audio: None })
    }

    fn elapsed_secs(&self) -> u64 {
        self.ticker.as_ref().map(Ticker::elapsed).unwrap_or(0)
    }

    fn is_recording(&self) -> bool {
        self.ticker.is_some()
    }
}
