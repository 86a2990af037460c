use std::rc::Rc;

use gtk4 as gtk;
use gtk4::prelude::*;

use crate::chat::list::ConversationSummary;

/// Row actions the sidebar exposes; each receives the conversation id.
pub struct SidebarActions {
    pub select: Box<dyn Fn(&str)>,
    pub toggle_pin: Box<dyn Fn(&str)>,
    pub toggle_mute: Box<dyn Fn(&str)>,
    pub delete: Box<dyn Fn(&str)>,
}

pub struct Sidebar {
    root: gtk::Box,
    search: gtk::SearchEntry,
    list: gtk::ListBox,
    status: gtk::Label,
    retry: gtk::Button,
}

impl Sidebar {
    pub fn new() -> Self {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);
        root.set_width_request(300);

        let title = gtk::Label::new(Some("Messages"));
        title.add_css_class("heading");
        title.set_halign(gtk::Align::Start);
        root.append(&title);

        let search = gtk::SearchEntry::new();
        search.set_placeholder_text(Some("Search conversations..."));
        root.append(&search);

        let status = gtk::Label::new(None);
        status.add_css_class("dim-label");
        status.set_visible(false);
        root.append(&status);
        let retry = gtk::Button::with_label("Try again");
        retry.set_halign(gtk::Align::Center);
        retry.set_visible(false);
        root.append(&retry);

        let list = gtk::ListBox::new();
        list.add_css_class("navigation-sidebar");
        let scroller = gtk::ScrolledWindow::builder().vexpand(true).child(&list).build();
        root.append(&scroller);

        Self { root, search, list, status, retry }
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    pub fn query(&self) -> String {
        self.search.text().to_string()
    }

    pub fn connect_search_changed<F: Fn() + 'static>(&self, f: F) {
        self.search.connect_search_changed(move |_| f());
    }

    pub fn connect_retry<F: Fn() + 'static>(&self, f: F) {
        self.retry.connect_clicked(move |_| f());
    }

    /// `retry` shows the reload button under the message.
    pub fn set_status(&self, text: Option<&str>, retry: bool) {
        self.status.set_visible(text.is_some());
        self.status.set_label(text.unwrap_or_default());
        self.retry.set_visible(retry);
    }

    pub fn set_items(&self, items: &[ConversationSummary], actions: &Rc<SidebarActions>) {
        while let Some(child) = self.list.first_child() {
            self.list.remove(&child);
        }
        for conv in items {
            let row = gtk::ListBoxRow::new();
            row.set_child(Some(&conversation_row(conv, actions)));
            self.list.append(&row);
            if conv.is_active {
                self.list.select_row(Some(&row));
            }
        }
    }
}

fn conversation_row(conv: &ConversationSummary, actions: &Rc<SidebarActions>) -> gtk::Widget {
    let outer = gtk::Box::new(gtk::Orientation::Horizontal, 8);
    outer.set_margin_top(6);
    outer.set_margin_bottom(6);

    let avatar = adw::Avatar::new(36, Some(&conv.name), true);
    outer.append(&avatar);

    let text = gtk::Box::new(gtk::Orientation::Vertical, 2);
    text.set_hexpand(true);
    let top = gtk::Box::new(gtk::Orientation::Horizontal, 4);
    let name = gtk::Label::new(Some(&conv.name));
    name.set_halign(gtk::Align::Start);
    name.set_hexpand(true);
    name.set_ellipsize(gtk::pango::EllipsizeMode::End);
    if conv.is_pinned {
        top.append(&gtk::Image::from_icon_name("view-pin-symbolic"));
    }
    top.append(&name);
    if conv.is_muted {
        top.append(&gtk::Image::from_icon_name("audio-volume-muted-symbolic"));
    }
    let when = gtk::Label::new(Some(&conv.last_message.timestamp.format("%H:%M").to_string()));
    when.add_css_class("dim-label");
    top.append(&when);
    text.append(&top);

    let preview = if conv.last_message.is_from_me {
        format!("You: {}", conv.last_message.content)
    } else {
        conv.last_message.content.clone()
    };
    let last = gtk::Label::new(Some(&preview));
    last.set_halign(gtk::Align::Start);
    last.set_ellipsize(gtk::pango::EllipsizeMode::End);
    last.add_css_class("dim-label");
    text.append(&last);
    outer.append(&text);

    let menu = gtk::Box::new(gtk::Orientation::Vertical, 2);
    let pin = gtk::Button::with_label(if conv.is_pinned { "Unpin" } else { "Pin" });
    let mute = gtk::Button::with_label(if conv.is_muted { "Unmute" } else { "Mute" });
    let delete = gtk::Button::with_label("Delete");
    delete.add_css_class("destructive-action");
    for b in [&pin, &mute, &delete] {
        b.add_css_class("flat");
        menu.append(b);
    }
    let popover = gtk::Popover::new();
    popover.set_child(Some(&menu));
    let more = gtk::MenuButton::builder()
        .icon_name("view-more-symbolic")
        .popover(&popover)
        .build();
    more.add_css_class("flat");
    outer.append(&more);

    let click = gtk::GestureClick::new();
    {
        let id = conv.id.clone();
        let actions = actions.clone();
        click.connect_released(move |_, _, _, _| (actions.select)(&id));
    }
    text.add_controller(click);
    {
        let id = conv.id.clone();
        let actions = actions.clone();
        let popover = popover.clone();
        pin.connect_clicked(move |_| {
            popover.popdown();
            (actions.toggle_pin)(&id)
        });
    }
    {
        let id = conv.id.clone();
        let actions = actions.clone();
        let popover = popover.clone();
        mute.connect_clicked(move |_| {
            popover.popdown();
            (actions.toggle_mute)(&id)
        });
    }
    {
        let id = conv.id.clone();
        let actions = actions.clone();
        delete.connect_clicked(move |_| {
            popover.popdown();
            (actions.delete)(&id)
        });
    }

    outer.upcast()
}
