use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use url::Url;

use crate::api::models::{FileUpload, Message, MessageKind, OutgoingPayload, UserSummary};
use crate::call::capture::{AudioCapture, Recording};
use crate::error::{ChatError, Result};
use crate::notify::{Notifier, Toast};
use crate::utils::{format_clock, format_file_size};

fn mime_for(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()).unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Message being composed: free text plus at most one attachment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    text: String,
    file: Option<FileUpload>,
}

impl Draft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn add_emoji(&mut self, emoji: &str) {
        self.text.push_str(emoji);
    }

    pub fn attachment(&self) -> Option<&FileUpload> {
        self.file.as_ref()
    }

    /// Replaces any previous attachment.
    pub fn attach(&mut self, file: FileUpload) {
        self.file = Some(file);
    }

    pub fn attach_path(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ChatError::validation("Not a file"))?;
        let absolute = std::path::absolute(path)?;
        let local_url = Url::from_file_path(&absolute).ok().map(String::from);
        self.attach(FileUpload { mime: mime_for(&name).to_string(), name, bytes, local_url });
        Ok(())
    }

    pub fn clear_attachment(&mut self) {
        self.file = None;
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.file.is_none()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.file = None;
    }

    /// `None` when there is nothing to send.
    pub fn payload(&self) -> Option<OutgoingPayload> {
        if self.is_empty() {
            return None;
        }
        match &self.file {
            None => Some(OutgoingPayload::Text(self.text.clone())),
            Some(file) => Some(OutgoingPayload::WithFile {
                content: (!self.text.trim().is_empty()).then(|| self.text.clone()),
                file: file.clone(),
            }),
        }
    }

    /// Local stand-in rendered until the server answers.
    pub fn placeholder(&self, temp_id: &str, author: UserSummary) -> Message {
        let mut msg = Message {
            id: temp_id.to_string(),
            content: self.text.clone(),
            created_at: Utc::now(),
            user_id: Some(author.id.clone()),
            user: Some(author),
            file_url: None,
            file_name: None,
            file_size: None,
            duration: None,
        };
        if let Some(file) = &self.file {
            let url = file
                .local_url
                .clone()
                .unwrap_or_else(|| format!("blob:{}", file.name));
            match MessageKind::from_url(&file.name) {
                MessageKind::Voice => msg.duration = Some("00:00".to_string()),
                MessageKind::Image => {}
                _ => {
                    msg.file_name = Some(file.name.clone());
                    msg.file_size = Some(format_file_size(file.bytes.len() as u64));
                }
            }
            msg.file_url = Some(url);
        }
        msg
    }
}

/// Microphone button behaviour on top of an [`AudioCapture`].
pub struct VoiceRecorder {
    capture: Box<dyn AudioCapture>,
    notifier: Arc<dyn Notifier>,
}

impl VoiceRecorder {
    pub fn new(capture: Box<dyn AudioCapture>, notifier: Arc<dyn Notifier>) -> Self {
        Self { capture, notifier }
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_recording()
    }

    pub fn elapsed_label(&self) -> String {
        format_clock(self.capture.elapsed_secs())
    }

    pub fn start_recording(&mut self) -> Result<()> {
        self.capture.start()?;
        self.notifier.notify(Toast::info(
            "Recording voice message",
            "Click the microphone button again to stop recording",
        ));
        Ok(())
    }

    pub fn stop_recording(&mut self) -> Result<Recording> {
        let recording = self.capture.stop()?;
        self.notifier.notify(Toast::info(
            "Voice message recorded",
            format!("Duration: {}", format_clock(recording.duration_secs)),
        ));
        Ok(recording)
    }

    /// Starts a recording, or stops the running one and returns it.
    pub fn toggle(&mut self) -> Result<Option<Recording>> {
        if self.capture.is_recording() {
            self.stop_recording().map(Some)
        } else {
            self.start_recording().map(|_| None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::capture::SimulatedCapture;
    use crate::notify::ToastQueue;
    use crate::testing::user;
    use std::time::Duration;

    fn upload(name: &str, len: usize) -> FileUpload {
        FileUpload {
            name: name.into(),
            mime: mime_for(name).into(),
            bytes: vec![0; len],
            local_url: Some(format!("file:///tmp/{name}")),
        }
    }

    #[test]
    fn blank_draft_has_no_payload() {
        let mut d = Draft::new();
        d.set_text("   ");
        assert!(d.payload().is_none());
    }

    #[test]
    fn text_and_file_payloads() {
        let mut d = Draft::new();
        d.set_text("hi");
        d.add_emoji("👋");
        assert_eq!(d.payload(), Some(OutgoingPayload::Text("hi👋".into())));

        d.set_text(" ");
        d.attach(upload("plan.pdf", 3000));
        match d.payload() {
            Some(OutgoingPayload::WithFile { content, file }) => {
                assert!(content.is_none());
                assert_eq!(file.mime, "application/pdf");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn placeholders_preview_attachments_locally() {
        let me = user("me", "Me");
        let mut d = Draft::new();
        d.attach(upload("plan.pdf", 3000));
        let file = d.placeholder("temp-1", me.clone());
        assert_eq!(file.kind(), MessageKind::File);
        assert_eq!(file.file_size.as_deref(), Some("2.9 KB"));
        assert_eq!(file.file_url.as_deref(), Some("file:///tmp/plan.pdf"));

        d.attach(upload("memo.ogg", 10));
        let voice = d.placeholder("temp-2", me.clone());
        assert_eq!(voice.kind(), MessageKind::Voice);
        assert_eq!(voice.duration.as_deref(), Some("00:00"));

        d.attach(upload("run.png", 10));
        assert_eq!(d.placeholder("temp-3", me).kind(), MessageKind::Image);
    }

    #[test]
    fn attach_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, b"jpeg").unwrap();
        let mut d = Draft::new();
        d.attach_path(&path).unwrap();
        let file = d.attachment().unwrap();
        assert_eq!(file.mime, "image/jpeg");
        assert!(file.local_url.as_deref().unwrap().starts_with("file://"));
    }

    #[tokio::test(start_paused = true)]
    async fn recorder_reports_duration() {
        let toasts = ToastQueue::new();
        let mut rec = VoiceRecorder::new(Box::new(SimulatedCapture::new()), Arc::new(toasts.clone()));
        assert!(rec.toggle().unwrap().is_none());
        assert!(rec.is_recording());
        tokio::time::sleep(Duration::from_millis(4200)).await;
        assert_eq!(rec.elapsed_label(), "00:04");
        let recording = rec.toggle().unwrap().unwrap();
        assert_eq!(recording.duration_secs, 4);
        assert!(recording.audio.is_none());
        assert_eq!(toasts.last().unwrap().description, "Duration: 00:04");
    }
}
