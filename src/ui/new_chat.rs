use std::cell::RefCell;
use std::rc::Rc;

use adw::prelude::*;
use gtk4 as gtk;

use crate::chat::new_chat::NewConversationFlow;
use crate::chat::Route;
use crate::ui::{spawn_then, Services};

pub fn show_new_chat_dialog<F>(parent: &adw::ApplicationWindow, services: &Services, overlay: &adw::ToastOverlay, on_route: F)
where
    F: Fn(Route) + 'static,
{
    let flow = Rc::new(RefCell::new(NewConversationFlow::new(
        services.backend.clone(),
        services.session.clone(),
        services.cache.clone(),
        services.notifier(),
    )));

    let dialog = gtk::Dialog::builder()
        .title("New Conversation")
        .transient_for(parent)
        .modal(true)
        .default_width(380)
        .default_height(480)
        .build();
    let content = gtk::Box::new(gtk::Orientation::Vertical, 8);
    content.set_margin_top(12);
    content.set_margin_bottom(12);
    content.set_margin_start(12);
    content.set_margin_end(12);

    let group = gtk::CheckButton::with_label("Group chat");
    let name = gtk::Entry::new();
    name.set_placeholder_text(Some("Group name"));
    name.set_visible(false);
    let search = gtk::SearchEntry::new();
    search.set_placeholder_text(Some("Search users..."));
    let selected = gtk::Label::new(None);
    selected.add_css_class("dim-label");
    selected.set_halign(gtk::Align::Start);
    selected.set_wrap(true);
    let list = gtk::ListBox::new();
    let scroller = gtk::ScrolledWindow::builder().vexpand(true).child(&list).build();
    for w in [group.upcast_ref::<gtk::Widget>(), name.upcast_ref(), search.upcast_ref(), selected.upcast_ref(), scroller.upcast_ref()] {
        content.append(w);
    }
    dialog.content_area().append(&content);
    let _ = dialog.add_button("Cancel", gtk::ResponseType::Cancel);
    let create = dialog.add_button("Create", gtk::ResponseType::Ok);
    create.add_css_class("suggested-action");

    let show_selected: Rc<dyn Fn()> = {
        let flow = flow.clone();
        let selected = selected.clone();
        Rc::new(move || {
            let names: Vec<String> = flow.borrow().selected().iter().map(|u| u.fullname.clone()).collect();
            selected.set_label(&if names.is_empty() { String::new() } else { format!("Selected: {}", names.join(", ")) });
        })
    };

    let fill: Rc<dyn Fn()> = {
        let flow = flow.clone();
        let list = list.clone();
        let search = search.clone();
        let show_selected = show_selected.clone();
        Rc::new(move || {
            while let Some(child) = list.first_child() {
                list.remove(&child);
            }
            let f = flow.borrow();
            let matches = f.filter(&search.text());
            if matches.is_empty() {
                list.append(&gtk::Label::new(Some("No users found")));
            }
            for user in matches {
                let label = match &user.email {
                    Some(email) => format!("{} ({})", user.fullname, email),
                    None => user.fullname.clone(),
                };
                let check = gtk::CheckButton::with_label(&label);
                check.set_active(f.is_selected(&user.id));
                let flow = flow.clone();
                let user = user.clone();
                let show_selected = show_selected.clone();
                check.connect_toggled(move |_| {
                    flow.borrow_mut().toggle_user(&user);
                    show_selected();
                });
                list.append(&check);
            }
        })
    };
    {
        let fill = fill.clone();
        search.connect_search_changed(move |_| fill());
    }
    {
        let flow = flow.clone();
        let name = name.clone();
        group.connect_toggled(move |g| {
            flow.borrow_mut().set_group(g.is_active());
            name.set_visible(g.is_active());
        });
    }
    {
        let flow = flow.clone();
        name.connect_changed(move |e| flow.borrow_mut().set_group_name(e.text().as_str()));
    }

    let token = services.session.token();
    let backend = services.backend.clone();
    {
        let flow = flow.clone();
        let services = services.clone();
        let overlay = overlay.clone();
        spawn_then(
            async move {
                match token {
                    Ok(token) => backend.users(&token).await,
                    Err(e) => Err(e),
                }
            },
            move |users| {
                let _ = flow.borrow_mut().apply_users(users);
                services.flush_toasts(&overlay);
                fill();
            },
        );
    }

    let services = services.clone();
    let overlay = overlay.clone();
    let on_route = Rc::new(on_route);
    dialog.connect_response(move |dlg, resp| {
        if resp != gtk::ResponseType::Ok {
            dlg.close();
            return;
        }
        let submitting = flow.borrow().clone();
        let services = services.clone();
        let overlay = overlay.clone();
        let on_route = on_route.clone();
        let dlg = dlg.clone();
        dlg.set_sensitive(false);
        spawn_then(
            async move { submitting.submit().await },
            move |result| {
                services.flush_toasts(&overlay);
                dlg.set_sensitive(true);
                if let Ok(route) = result {
                    dlg.close();
                    on_route(route);
                }
            },
        );
    });

    dialog.present();
}
