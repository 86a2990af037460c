use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use adw::prelude::*;
use gtk4 as gtk;
use log::warn;

use crate::api::models::{Message, MessageKind};
use crate::call::capture::SimulatedCapture;
use crate::call::signaling::{CallKind, SimulatedSignaling};
use crate::call::{CallController, CallPhase};
use crate::chat::compose::VoiceRecorder;
use crate::chat::outbox::Delivery;
use crate::chat::view::{ConversationView, ViewState};
use crate::ui::{spawn_then, Services};
use crate::utils::RUNTIME;

const EMOJIS: [&str; 8] = ["😀", "😂", "❤️", "👍", "🔥", "💪", "🎉", "🙏"];

/// Right-hand pane: the open conversation, its composer and the call bar.
pub struct ChatPane {
    services: Services,
    overlay: adw::ToastOverlay,
    view: RefCell<ConversationView>,
    call: RefCell<CallController>,
    recorder: RefCell<VoiceRecorder>,
    on_back: RefCell<Option<Box<dyn Fn()>>>,
    ticking: Cell<bool>,
    root: gtk::Stack,
    status: adw::StatusPage,
    back: gtk::Button,
    title: adw::WindowTitle,
    voice_call: gtk::Button,
    video_call: gtk::Button,
    add_people: gtk::Button,
    messages: gtk::Box,
    scroller: gtk::ScrolledWindow,
    entry: gtk::Entry,
    attachment: gtk::Label,
    mic: gtk::Button,
    call_bar: gtk::Revealer,
    call_label: gtk::Label,
    accept: gtk::Button,
    reject: gtk::Button,
    mute: gtk::ToggleButton,
    camera: gtk::ToggleButton,
    fullscreen: gtk::ToggleButton,
    hang_up: gtk::Button,
}

fn icon_button(icon: &str, tooltip: &str) -> gtk::Button {
    let b = gtk::Button::from_icon_name(icon);
    b.set_tooltip_text(Some(tooltip));
    b.add_css_class("flat");
    b
}

fn toggle(label: &str) -> gtk::ToggleButton {
    gtk::ToggleButton::builder().label(label).build()
}

impl ChatPane {
    pub fn new(services: Services, overlay: adw::ToastOverlay) -> Rc<Self> {
        let notifier = services.notifier();
        let view = ConversationView::new(
            services.backend.clone(),
            services.session.clone(),
            services.cache.clone(),
            notifier.clone(),
        );
        let call = CallController::new(Arc::new(SimulatedSignaling::new()), notifier.clone());
        let recorder = VoiceRecorder::new(Box::new(SimulatedCapture::new()), notifier);

        let status = adw::StatusPage::builder().icon_name("chat-message-new-symbolic").vexpand(true).build();
        let back = gtk::Button::with_label("Back to messages");
        back.add_css_class("pill");
        back.set_halign(gtk::Align::Center);
        status.set_child(Some(&back));

        let title = adw::WindowTitle::new("Chat", "");
        let voice_call = icon_button("call-start-symbolic", "Voice call");
        let video_call = icon_button("camera-video-symbolic", "Video call");
        let add_people = icon_button("contact-new-symbolic", "Add participants");
        let header = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        header.set_margin_start(8);
        header.set_margin_end(8);
        title.set_hexpand(true);
        header.append(&title);
        header.append(&voice_call);
        header.append(&video_call);
        header.append(&add_people);

        let call_label = gtk::Label::new(None);
        call_label.set_hexpand(true);
        call_label.set_halign(gtk::Align::Start);
        let accept = gtk::Button::with_label("Accept");
        accept.add_css_class("suggested-action");
        let reject = gtk::Button::with_label("Reject");
        reject.add_css_class("destructive-action");
        let mute = toggle("Mute");
        let camera = toggle("Camera off");
        let fullscreen = toggle("Fullscreen");
        let hang_up = gtk::Button::with_label("End call");
        hang_up.add_css_class("destructive-action");
        let call_row = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        call_row.set_margin_start(8);
        call_row.set_margin_end(8);
        call_row.add_css_class("card");
        call_row.append(&call_label);
        for w in [accept.upcast_ref::<gtk::Widget>(), reject.upcast_ref(), mute.upcast_ref(), camera.upcast_ref(), fullscreen.upcast_ref(), hang_up.upcast_ref()] {
            call_row.append(w);
        }
        let call_bar = gtk::Revealer::builder().child(&call_row).reveal_child(false).build();

        let messages = gtk::Box::new(gtk::Orientation::Vertical, 6);
        messages.set_margin_start(8);
        messages.set_margin_end(8);
        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .hexpand(true)
            .child(&messages)
            .build();

        let attachment = gtk::Label::new(None);
        attachment.add_css_class("dim-label");
        attachment.set_halign(gtk::Align::Start);
        attachment.set_visible(false);

        let input_row = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let attach = icon_button("mail-attachment-symbolic", "Attach file");
        let emoji_box = gtk::FlowBox::new();
        emoji_box.set_max_children_per_line(4);
        let emoji_popover = gtk::Popover::new();
        emoji_popover.set_child(Some(&emoji_box));
        let emoji = gtk::MenuButton::builder()
            .icon_name("face-smile-symbolic")
            .popover(&emoji_popover)
            .build();
        emoji.add_css_class("flat");
        let mic = icon_button("audio-input-microphone-symbolic", "Record voice message");
        let entry = gtk::Entry::new();
        entry.set_hexpand(true);
        entry.set_placeholder_text(Some("Type a message..."));
        let send_btn = gtk::Button::with_label("Send");
        send_btn.add_css_class("suggested-action");
        input_row.append(&attach);
        input_row.append(&emoji);
        input_row.append(&mic);
        input_row.append(&entry);
        input_row.append(&send_btn);

        let chat = gtk::Box::new(gtk::Orientation::Vertical, 6);
        chat.set_margin_top(8);
        chat.set_margin_bottom(8);
        chat.append(&header);
        chat.append(&call_bar);
        chat.append(&scroller);
        chat.append(&attachment);
        input_row.set_margin_start(8);
        input_row.set_margin_end(8);
        chat.append(&input_row);

        let root = gtk::Stack::new();
        root.add_named(&status, Some("status"));
        root.add_named(&chat, Some("chat"));

        let pane = Rc::new(Self {
            services,
            overlay,
            view: RefCell::new(view),
            call: RefCell::new(call),
            recorder: RefCell::new(recorder),
            on_back: RefCell::new(None),
            ticking: Cell::new(false),
            root,
            status,
            back,
            title,
            voice_call,
            video_call,
            add_people,
            messages,
            scroller,
            entry,
            attachment,
            mic,
            call_bar,
            call_label,
            accept,
            reject,
            mute,
            camera,
            fullscreen,
            hang_up,
        });

        for e in EMOJIS {
            let b = gtk::Button::with_label(e);
            b.add_css_class("flat");
            let weak = Rc::downgrade(&pane);
            b.connect_clicked(move |_| {
                if let Some(p) = weak.upgrade() {
                    let mut view = p.view.borrow_mut();
                    let draft = view.draft_mut();
                    draft.set_text(p.entry.text().as_str());
                    draft.add_emoji(e);
                    p.entry.set_text(draft.text());
                }
            });
            emoji_box.insert(&b, -1);
        }
        pane.connect_signals(&attach, &send_btn);
        pane.render();
        pane
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    pub fn active_id(&self) -> Option<String> {
        self.view.borrow().chat_id().map(str::to_string)
    }

    pub fn connect_back<F: Fn() + 'static>(&self, f: F) {
        *self.on_back.borrow_mut() = Some(Box::new(f));
    }

    fn flush(&self) {
        self.services.flush_toasts(&self.overlay);
    }

    fn connect_signals(self: &Rc<Self>, attach: &gtk::Button, send_btn: &gtk::Button) {
        let weak = Rc::downgrade(self);
        let on = move |f: fn(&Rc<ChatPane>)| {
            let weak: Weak<ChatPane> = weak.clone();
            move || {
                if let Some(p) = weak.upgrade() {
                    f(&p);
                }
            }
        };

        let send = on(|p| p.send());
        send_btn.connect_clicked(move |_| send());
        let send = on(|p| p.send());
        self.entry.connect_activate(move |_| send());

        let back = on(|p| {
            if let Some(f) = p.on_back.borrow().as_ref() {
                f();
            }
        });
        self.back.connect_clicked(move |_| back());

        let pick = on(|p| p.pick_file());
        attach.connect_clicked(move |_| pick());
        let mic = on(|p| p.toggle_recording());
        self.mic.connect_clicked(move |_| mic());

        let voice = on(|p| p.start_call(CallKind::Audio));
        self.voice_call.connect_clicked(move |_| voice());
        let video = on(|p| p.start_call(CallKind::Video));
        self.video_call.connect_clicked(move |_| video());
        let accept = on(|p| {
            let _guard = RUNTIME.enter();
            if let Err(e) = p.call.borrow_mut().accept() {
                warn!("accept failed: {}", e);
            }
            p.after_call_change();
        });
        self.accept.connect_clicked(move |_| accept());
        let reject = on(|p| {
            p.call.borrow_mut().reject();
            p.after_call_change();
        });
        self.reject.connect_clicked(move |_| reject());
        let hang_up = on(|p| p.end_call());
        self.hang_up.connect_clicked(move |_| hang_up());
        let mute = on(|p| {
            p.call.borrow_mut().toggle_mute();
            p.after_call_change();
        });
        self.mute.connect_clicked(move |_| mute());
        let camera = on(|p| {
            p.call.borrow_mut().toggle_video();
            p.after_call_change();
        });
        self.camera.connect_clicked(move |_| camera());
        let fullscreen = on(|p| {
            p.call.borrow_mut().toggle_fullscreen();
            p.after_call_change();
        });
        self.fullscreen.connect_clicked(move |_| fullscreen());

        let add = on(|p| p.show_add_participants());
        self.add_people.connect_clicked(move |_| add());
    }

    /// Opens `chat_id`: straight from the cache, or after a fetch on the runtime.
    pub fn open(self: &Rc<Self>, chat_id: &str) {
        if self.view.borrow().chat_id() == Some(chat_id) && *self.view.borrow().state() == ViewState::Ready {
            return;
        }
        if !self.call.borrow().is_idle() {
            self.call.borrow_mut().finish();
        }
        let hit = self.view.borrow_mut().open_cached(chat_id);
        self.render();
        if hit {
            self.after_open();
            return;
        }
        let token = self.services.session.token();
        let backend = self.services.backend.clone();
        let id = chat_id.to_string();
        let weak = Rc::downgrade(self);
        spawn_then(
            {
                let id = id.clone();
                async move {
                    match token {
                        Ok(token) => backend.conversation(&token, &id).await,
                        Err(e) => Err(e),
                    }
                }
            },
            move |fetched| {
                let Some(p) = weak.upgrade() else { return };
                if !p.view.borrow_mut().apply_fetch(&id, fetched) {
                    return;
                }
                p.render();
                p.flush();
                if *p.view.borrow().state() == ViewState::Ready {
                    p.after_open();
                }
            },
        );
    }

    pub fn close(self: &Rc<Self>) {
        self.call.borrow_mut().finish();
        self.view.borrow_mut().close();
        self.render();
    }

    fn after_open(self: &Rc<Self>) {
        let (title, partner, chat_id, token) = {
            let view = self.view.borrow();
            (
                view.title(),
                view.partner().cloned(),
                view.chat_id().map(str::to_string),
                self.services.session.token().ok(),
            )
        };
        self.call.borrow_mut().set_chat_name(title);

        if let (Some(chat_id), Some(token)) = (chat_id.clone(), token) {
            let backend = self.services.backend.clone();
            crate::utils::spawn_async(async move {
                if let Err(e) = backend.mark_read(&token, &chat_id).await {
                    warn!("read receipt for {} failed: {}", chat_id, e);
                }
            });
        }

        let Some(partner) = partner else { return };
        let signaling = self.call.borrow().signaling();
        let weak = Rc::downgrade(self);
        spawn_then(
            async move { signaling.next_incoming(&partner).await },
            move |offer| {
                let Some(p) = weak.upgrade() else { return };
                let Some(offer) = offer else { return };
                if p.view.borrow().chat_id().map(str::to_string) != chat_id {
                    return;
                }
                if p.call.borrow_mut().offer_incoming(offer) {
                    p.after_call_change();
                }
            },
        );
    }

    fn render(self: &Rc<Self>) {
        let state = self.view.borrow().state().clone();
        let (title, description, show_back) = match state {
            ViewState::Ready => {
                self.render_header();
                self.render_messages();
                self.render_draft();
                self.render_call();
                self.root.set_visible_child_name("chat");
                return;
            }
            ViewState::NoSelection => ("Select a conversation", "Choose a conversation to start messaging".to_string(), false),
            ViewState::Loading => ("Loading...", String::new(), false),
            ViewState::NotFound => ("Chat not found", "This conversation does not exist or was deleted.".to_string(), true),
            ViewState::Unauthorized => ("You are not authorized to view this chat.", "Authentication failed. Please login again.".to_string(), true),
            ViewState::Error(text) => ("Something went wrong", text, true),
        };
        self.status.set_title(title);
        self.status.set_description(Some(&description));
        self.back.set_visible(show_back);
        self.root.set_visible_child_name("status");
    }

    fn render_header(&self) {
        let view = self.view.borrow();
        self.title.set_title(&view.title());
        self.title.set_subtitle(&view.subtitle());
        let can_call = !view.is_group() && view.partner().is_some();
        self.voice_call.set_sensitive(can_call);
        self.video_call.set_sensitive(can_call);
        self.add_people.set_visible(view.is_group() && view.is_admin());
    }

    fn render_messages(self: &Rc<Self>) {
        while let Some(child) = self.messages.first_child() {
            self.messages.remove(&child);
        }
        let me = self.services.session.current_user_id();
        let view = self.view.borrow();
        for entry in view.timeline().entries() {
            let mine = entry.message.author_id() == Some(me.as_str());
            self.messages.append(&self.message_row(&entry.message, entry.delivery, mine));
        }
        let adj = self.scroller.vadjustment();
        adj.set_value(adj.upper());
    }

    fn message_row(self: &Rc<Self>, message: &Message, delivery: Delivery, mine: bool) -> gtk::Widget {
        let bubble = gtk::Box::new(gtk::Orientation::Vertical, 2);
        bubble.add_css_class("card");
        bubble.set_halign(if mine { gtk::Align::End } else { gtk::Align::Start });
        if !mine {
            if let Some(user) = &message.user {
                let author = gtk::Label::new(Some(&user.fullname));
                author.add_css_class("caption-heading");
                author.set_halign(gtk::Align::Start);
                bubble.append(&author);
            }
        }
        if let Some(att) = message.attachment() {
            let widget: gtk::Widget = match att.kind {
                MessageKind::Image => gtk::LinkButton::with_label(&att.url, "Image").upcast(),
                MessageKind::Voice => gtk::Label::new(Some(&format!(
                    "Voice message {}",
                    att.duration.as_deref().unwrap_or("00:00")
                )))
                .upcast(),
                _ => gtk::LinkButton::with_label(
                    &att.url,
                    &format!(
                        "{} ({})",
                        att.name.as_deref().unwrap_or("File"),
                        att.size.as_deref().unwrap_or("?")
                    ),
                )
                .upcast(),
            };
            bubble.append(&widget);
        }
        if !message.content.is_empty() {
            let text = gtk::Label::new(Some(&message.content));
            text.set_wrap(true);
            text.set_xalign(0.0);
            text.set_selectable(true);
            bubble.append(&text);
        }
        let meta = gtk::Label::new(Some(&match delivery {
            Delivery::Pending => "Sending...".to_string(),
            Delivery::Confirmed => message.created_at.format("%H:%M").to_string(),
        }));
        meta.add_css_class("dim-label");
        meta.add_css_class("caption");
        meta.set_halign(gtk::Align::End);

        if !(mine && delivery == Delivery::Confirmed) {
            bubble.append(&meta);
            return bubble.upcast();
        }
        let footer = gtk::Box::new(gtk::Orientation::Horizontal, 4);
        footer.set_halign(gtk::Align::End);
        let edit = gtk::Button::with_label("Edit");
        let delete = gtk::Button::with_label("Delete");
        for b in [&edit, &delete] {
            b.add_css_class("flat");
            b.add_css_class("caption");
        }
        {
            let weak = Rc::downgrade(self);
            let id = message.id.clone();
            let content = message.content.clone();
            edit.connect_clicked(move |_| {
                if let Some(p) = weak.upgrade() {
                    p.show_edit(&id, &content);
                }
            });
        }
        {
            let weak = Rc::downgrade(self);
            let id = message.id.clone();
            delete.connect_clicked(move |_| {
                if let Some(p) = weak.upgrade() {
                    p.delete_message(&id);
                }
            });
        }
        footer.append(&meta);
        footer.append(&edit);
        footer.append(&delete);
        bubble.append(&footer);
        bubble.upcast()
    }

    fn render_draft(&self) {
        let view = self.view.borrow();
        match view.draft().attachment() {
            Some(file) => {
                self.attachment.set_label(&format!("Attached: {}", file.name));
                self.attachment.set_visible(true);
            }
            None => self.attachment.set_visible(false),
        }
        let recording = self.recorder.borrow().is_recording();
        self.mic.set_icon_name(if recording {
            "media-playback-stop-symbolic"
        } else {
            "audio-input-microphone-symbolic"
        });
    }

    fn render_call(&self) {
        let call = self.call.borrow();
        let controls = call.controls();
        let (label, incoming, active) = match call.phase() {
            CallPhase::Idle => (String::new(), false, false),
            CallPhase::Outgoing { kind, partner } => (format!("Calling {} ({})...", partner.fullname, kind.label()), false, false),
            CallPhase::Incoming { kind, caller } => (format!("Incoming {} call from {}", kind.label(), caller.fullname), true, false),
            CallPhase::Active { kind, .. } => (format!("{} call · {}", kind.label(), call.duration_label()), false, true),
        };
        self.call_bar.set_reveal_child(!call.is_idle());
        self.call_label.set_label(&label);
        self.accept.set_visible(incoming);
        self.reject.set_visible(incoming);
        self.mute.set_visible(active);
        self.mute.set_active(controls.muted);
        let is_video = matches!(call.phase(), CallPhase::Active { kind: CallKind::Video, .. });
        self.camera.set_visible(is_video);
        self.camera.set_active(!controls.video_enabled);
        self.fullscreen.set_visible(active);
        self.fullscreen.set_active(controls.fullscreen);
        self.hang_up.set_visible(!call.is_idle() && !incoming);
    }

    fn after_call_change(self: &Rc<Self>) {
        self.render_call();
        self.flush();
        if self.call.borrow().is_active() && !self.ticking.replace(true) {
            let weak = Rc::downgrade(self);
            glib::timeout_add_seconds_local(1, move || {
                let Some(p) = weak.upgrade() else { return glib::ControlFlow::Break };
                p.render_call();
                if p.call.borrow().is_active() {
                    glib::ControlFlow::Continue
                } else {
                    p.ticking.set(false);
                    glib::ControlFlow::Break
                }
            });
        }
    }

    fn start_call(self: &Rc<Self>, kind: CallKind) {
        let (partner, is_group) = {
            let view = self.view.borrow();
            (view.partner().cloned(), view.is_group())
        };
        let begun = self.call.borrow_mut().begin_outgoing(partner.as_ref(), is_group, kind);
        self.render_call();
        self.flush();
        let (Ok(()), Some(partner)) = (begun, partner) else { return };
        let signaling = self.call.borrow().signaling();
        let weak = Rc::downgrade(self);
        spawn_then(
            async move { signaling.dial(&partner, kind).await },
            move |outcome| {
                let Some(p) = weak.upgrade() else { return };
                let _guard = RUNTIME.enter();
                if let Err(e) = p.call.borrow_mut().complete_dial(outcome) {
                    warn!("call did not start: {}", e);
                }
                p.after_call_change();
            },
        );
    }

    fn end_call(self: &Rc<Self>) {
        let signaling = self.call.borrow().signaling();
        self.call.borrow_mut().finish();
        self.after_call_change();
        crate::utils::spawn_async(async move {
            if let Err(e) = signaling.hang_up().await {
                warn!("hang up failed: {}", e);
            }
        });
    }

    fn send(self: &Rc<Self>) {
        let text = self.entry.text().to_string();
        let pending = {
            let mut view = self.view.borrow_mut();
            view.draft_mut().set_text(text);
            view.begin_send()
        };
        let pending = match pending {
            Ok(Some(p)) => p,
            Ok(None) => return,
            Err(_) => {
                self.flush();
                return;
            }
        };
        self.entry.set_text("");
        self.render_messages();
        self.render_draft();

        let backend = self.services.backend.clone();
        let temp_id = pending.temp_id.clone();
        let chat_id = pending.chat_id.clone();
        let weak = Rc::downgrade(self);
        spawn_then(
            async move {
                backend
                    .send_message(&pending.token, &pending.chat_id, &pending.payload)
                    .await
            },
            move |result| {
                let Some(p) = weak.upgrade() else { return };
                let _ = p.view.borrow_mut().complete_send(&chat_id, &temp_id, result);
                p.render_messages();
                p.flush();
            },
        );
    }

    fn pick_file(self: &Rc<Self>) {
        let parent = self.root.root().and_downcast::<gtk::Window>();
        let dialog = gtk::FileChooserNative::new(
            Some("Attach file"),
            parent.as_ref(),
            gtk::FileChooserAction::Open,
            Some("_Attach"),
            Some("_Cancel"),
        );
        let weak = Rc::downgrade(self);
        let keep = dialog.clone();
        dialog.connect_response(move |dialog, response| {
            let _ = &keep;
            if response == gtk::ResponseType::Accept {
                if let (Some(p), Some(path)) = (weak.upgrade(), dialog.file().and_then(|f| f.path())) {
                    if let Err(e) = p.view.borrow_mut().draft_mut().attach_path(&path) {
                        p.overlay.add_toast(adw::Toast::new(&format!("Could not attach file: {}", e)));
                    }
                    p.render_draft();
                }
            }
            dialog.destroy();
        });
        dialog.show();
    }

    fn toggle_recording(&self) {
        let _guard = RUNTIME.enter();
        if let Err(e) = self.recorder.borrow_mut().toggle() {
            warn!("voice recorder: {}", e);
        }
        self.render_draft();
        self.flush();
    }

    fn show_edit(self: &Rc<Self>, message_id: &str, content: &str) {
        let parent = self.root.root().and_downcast::<gtk::Window>();
        let dialog = gtk::Dialog::builder().title("Edit message").modal(true).build();
        dialog.set_transient_for(parent.as_ref());
        let entry = gtk::Entry::new();
        entry.set_text(content);
        entry.set_margin_top(12);
        entry.set_margin_bottom(12);
        entry.set_margin_start(12);
        entry.set_margin_end(12);
        dialog.content_area().append(&entry);
        let _ = dialog.add_button("Cancel", gtk::ResponseType::Cancel);
        let save = dialog.add_button("Save", gtk::ResponseType::Ok);
        save.add_css_class("suggested-action");

        let weak = Rc::downgrade(self);
        let id = message_id.to_string();
        dialog.connect_response(move |dlg, resp| {
            dlg.close();
            if resp != gtk::ResponseType::Ok {
                return;
            }
            let Some(p) = weak.upgrade() else { return };
            let content = entry.text().to_string();
            if content.trim().is_empty() {
                return;
            }
            let target = p.view.borrow().message_target(&id);
            let Ok((chat_id, token)) = target else { return };
            let backend = p.services.backend.clone();
            let id = id.clone();
            let weak = Rc::downgrade(&p);
            let target = chat_id.clone();
            spawn_then(
                async move { backend.edit_message(&token, &chat_id, &id, &content).await },
                move |result| {
                    let Some(p) = weak.upgrade() else { return };
                    let _ = p.view.borrow_mut().apply_edit(&target, result);
                    p.render_messages();
                    p.flush();
                },
            );
        });
        dialog.present();
    }

    fn delete_message(self: &Rc<Self>, message_id: &str) {
        let target = self.view.borrow().message_target(message_id);
        let Ok((chat_id, token)) = target else { return };
        let backend = self.services.backend.clone();
        let id = message_id.to_string();
        let weak = Rc::downgrade(self);
        let target = chat_id.clone();
        spawn_then(
            {
                let id = id.clone();
                async move { backend.delete_message(&token, &chat_id, &id).await }
            },
            move |result| {
                let Some(p) = weak.upgrade() else { return };
                let _ = p.view.borrow_mut().apply_delete(&target, &id, result);
                p.render_messages();
                p.flush();
            },
        );
    }

    fn show_add_participants(self: &Rc<Self>) {
        let parent = self.root.root().and_downcast::<gtk::Window>();
        let dialog = gtk::Dialog::builder().title("Add participants").modal(true).build();
        dialog.set_transient_for(parent.as_ref());
        dialog.set_default_size(360, 420);
        let content = gtk::Box::new(gtk::Orientation::Vertical, 8);
        content.set_margin_top(12);
        content.set_margin_bottom(12);
        content.set_margin_start(12);
        content.set_margin_end(12);
        let search = gtk::SearchEntry::new();
        search.set_placeholder_text(Some("Search users..."));
        let list = gtk::ListBox::new();
        let scroller = gtk::ScrolledWindow::builder().vexpand(true).child(&list).build();
        content.append(&search);
        content.append(&scroller);
        dialog.content_area().append(&content);
        let _ = dialog.add_button("Cancel", gtk::ResponseType::Cancel);
        let add = dialog.add_button("Add", gtk::ResponseType::Ok);
        add.add_css_class("suggested-action");

        let fill: Rc<dyn Fn()> = {
            let weak = Rc::downgrade(self);
            let list = list.clone();
            let search = search.clone();
            Rc::new(move || {
                let Some(p) = weak.upgrade() else { return };
                while let Some(child) = list.first_child() {
                    list.remove(&child);
                }
                let view = p.view.borrow();
                for user in view.filter_available(&search.text()) {
                    let check = gtk::CheckButton::with_label(&user.fullname);
                    check.set_active(view.selected_users().contains(&user.id));
                    let weak = Rc::downgrade(&p);
                    let id = user.id.clone();
                    check.connect_toggled(move |_| {
                        if let Some(p) = weak.upgrade() {
                            p.view.borrow_mut().toggle_selected_user(&id);
                        }
                    });
                    list.append(&check);
                }
            })
        };
        {
            let fill = fill.clone();
            search.connect_search_changed(move |_| fill());
        }

        let token = self.services.session.token();
        let backend = self.services.backend.clone();
        let weak = Rc::downgrade(self);
        spawn_then(
            async move {
                match token {
                    Ok(token) => backend.users(&token).await,
                    Err(e) => Err(e),
                }
            },
            move |users| {
                let Some(p) = weak.upgrade() else { return };
                let _ = p.view.borrow_mut().apply_available_users(users);
                p.flush();
                fill();
            },
        );

        let weak = Rc::downgrade(self);
        dialog.connect_response(move |dlg, resp| {
            dlg.close();
            if resp != gtk::ResponseType::Ok {
                return;
            }
            let Some(p) = weak.upgrade() else { return };
            let begun = p.view.borrow().begin_add_participants();
            let Ok((chat_id, token, ids)) = begun else {
                p.flush();
                return;
            };
            let backend = p.services.backend.clone();
            let added = ids.len();
            let weak = Rc::downgrade(&p);
            spawn_then(
                async move { backend.add_participants(&token, &chat_id, &ids).await },
                move |result| {
                    let Some(p) = weak.upgrade() else { return };
                    let _ = p.view.borrow_mut().complete_add_participants(added, result);
                    p.render();
                    p.flush();
                },
            );
        });
        dialog.present();
    }
}
