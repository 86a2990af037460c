use std::cell::{OnceCell, RefCell};
use std::rc::Rc;

use adw::prelude::*;
use adw::Application;
use log::error;

use crate::app::AppState;
use crate::chat::list::{ConversationList, ListState};
use crate::chat::Route;
use crate::ui::chat_view::ChatPane;
use crate::ui::sidebar::{Sidebar, SidebarActions};
use crate::ui::{spawn_then, Services};

struct Shell {
    app: Application,
    window: adw::ApplicationWindow,
    overlay: adw::ToastOverlay,
    services: Services,
    list: RefCell<ConversationList>,
    sidebar: Sidebar,
    pane: Rc<ChatPane>,
    actions: OnceCell<Rc<SidebarActions>>,
}

impl Shell {
    fn flush(&self) {
        self.services.flush_toasts(&self.overlay);
    }

    fn refresh_sidebar(&self) {
        let Some(actions) = self.actions.get() else { return };
        let query = self.sidebar.query();
        let active = self.pane.active_id();
        let list = self.list.borrow();
        let rows = list.filter(&query, active.as_deref());
        self.sidebar.set_items(&rows, actions);
        let status = match (rows.is_empty(), list.state()) {
            (false, _) => None,
            (true, ListState::Loading) => Some("Loading conversations...".to_string()),
            (true, ListState::Failed(text)) => Some(text.clone()),
            (true, ListState::Ready) => Some(ConversationList::empty_label(&query).to_string()),
        };
        let failed = matches!(list.state(), ListState::Failed(_));
        self.sidebar.set_status(status.as_deref(), failed);
    }

    fn load(self: &Rc<Self>) {
        self.list.borrow_mut().prime_from_cache();
        self.refresh_sidebar();
        let token = self.services.session.token();
        let backend = self.services.backend.clone();
        let weak = Rc::downgrade(self);
        spawn_then(
            async move {
                match token {
                    Ok(token) => backend.conversations(&token).await,
                    Err(e) => Err(e),
                }
            },
            move |fetched| {
                let Some(shell) = weak.upgrade() else { return };
                let _ = shell.list.borrow_mut().apply_fetched(fetched);
                shell.refresh_sidebar();
                shell.flush();
            },
        );
    }

    fn navigate(self: &Rc<Self>, route: Route) {
        match route {
            Route::Messages => self.pane.close(),
            Route::Conversation(id) => self.pane.open(&id),
            Route::NewConversation => {
                let weak = Rc::downgrade(self);
                crate::ui::new_chat::show_new_chat_dialog(&self.window, &self.services, &self.overlay, move |route| {
                    if let Some(shell) = weak.upgrade() {
                        shell.load();
                        shell.navigate(route);
                    }
                });
            }
        }
        self.refresh_sidebar();
    }

    fn select(self: &Rc<Self>, chat_id: &str) {
        let route = self.list.borrow_mut().select(chat_id);
        self.navigate(route);
    }

    fn toggle_pin(&self, chat_id: &str) {
        self.list.borrow_mut().toggle_pin(chat_id);
        self.refresh_sidebar();
        self.flush();
    }

    fn toggle_mute(&self, chat_id: &str) {
        self.list.borrow_mut().toggle_mute(chat_id);
        self.refresh_sidebar();
        self.flush();
    }

    fn confirm_delete(self: &Rc<Self>, chat_id: &str) {
        self.list.borrow_mut().request_delete(chat_id);
        let dialog = gtk4::Dialog::builder()
            .title("Delete Chat")
            .transient_for(&self.window)
            .modal(true)
            .build();
        let text = gtk4::Label::new(Some(
            "Are you sure you want to delete this chat? This action cannot be undone.",
        ));
        text.set_wrap(true);
        text.set_margin_top(12);
        text.set_margin_bottom(12);
        text.set_margin_start(12);
        text.set_margin_end(12);
        dialog.content_area().append(&text);
        let _ = dialog.add_button("Cancel", gtk4::ResponseType::Cancel);
        let delete = dialog.add_button("Delete", gtk4::ResponseType::Ok);
        delete.add_css_class("destructive-action");

        let weak = Rc::downgrade(self);
        dialog.connect_response(move |dlg, resp| {
            dlg.close();
            let Some(shell) = weak.upgrade() else { return };
            let pending = shell.list.borrow().pending_delete().map(str::to_string);
            let (gtk4::ResponseType::Ok, Some(chat_id)) = (resp, pending) else {
                shell.list.borrow_mut().cancel_delete();
                return;
            };
            let token = shell.services.session.token();
            let backend = shell.services.backend.clone();
            let weak = Rc::downgrade(&shell);
            let id = chat_id.clone();
            spawn_then(
                async move {
                    match token {
                        Ok(token) => backend.delete_conversation(&token, &id).await,
                        Err(e) => Err(e),
                    }
                },
                move |outcome| {
                    let Some(shell) = weak.upgrade() else { return };
                    let active = shell.pane.active_id();
                    let result = shell
                        .list
                        .borrow_mut()
                        .complete_delete(&chat_id, outcome, active.as_deref());
                    if let Ok(Some(route)) = result {
                        shell.navigate(route);
                    }
                    shell.refresh_sidebar();
                    shell.flush();
                },
            );
        });
        dialog.present();
    }

    fn logout(&self) {
        if let Err(e) = self.services.session.logout(&self.services.cache) {
            error!("logout failed: {}", e);
        }
        crate::ui::login::show_login_window(&self.app);
        self.window.close();
    }
}

pub fn show_main_window(app: &Application) {
    let services = match Services::connect(AppState::load()) {
        Ok(s) => s,
        Err(e) => {
            error!("cannot reach backend: {}", e);
            crate::ui::login::show_login_window(app);
            return;
        }
    };

    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("HabitChat")
        .default_width(960)
        .default_height(640)
        .build();

    let overlay = adw::ToastOverlay::new();

    let split = adw::Flap::builder()
        .reveal_flap(true)
        .locked(true)
        .modal(false)
        .build();

    let sidebar = Sidebar::new();
    split.set_flap(Some(&sidebar.widget()));

    let pane = ChatPane::new(services.clone(), overlay.clone());
    split.set_content(Some(&pane.widget()));

    overlay.set_child(Some(&split));

    let container = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let title = gtk4::Label::new(Some("Messages"));
    header.set_title_widget(Some(&title));

    let new_chat_btn = gtk4::Button::with_label("New Chat");
    new_chat_btn.add_css_class("suggested-action");
    header.pack_end(&new_chat_btn);
    let logout_btn = gtk4::Button::from_icon_name("system-log-out-symbolic");
    logout_btn.set_tooltip_text(Some("Log out"));
    header.pack_start(&logout_btn);
    container.append(&header);
    container.append(&overlay);
    window.set_content(Some(&container));

    let list = ConversationList::new(
        services.backend.clone(),
        services.session.clone(),
        services.cache.clone(),
        services.notifier(),
    );
    let shell = Rc::new(Shell {
        app: app.clone(),
        window: window.clone(),
        overlay,
        services,
        list: RefCell::new(list),
        sidebar,
        pane,
        actions: OnceCell::new(),
    });

    let weak = Rc::downgrade(&shell);
    let with = move |f: fn(&Rc<Shell>, &str)| {
        let weak = weak.clone();
        Box::new(move |id: &str| {
            if let Some(shell) = weak.upgrade() {
                f(&shell, id);
            }
        }) as Box<dyn Fn(&str)>
    };
    let _ = shell.actions.set(Rc::new(SidebarActions {
        select: with(|s, id| s.select(id)),
        toggle_pin: with(|s, id| s.toggle_pin(id)),
        toggle_mute: with(|s, id| s.toggle_mute(id)),
        delete: with(|s, id| s.confirm_delete(id)),
    }));

    {
        let weak = Rc::downgrade(&shell);
        shell.sidebar.connect_search_changed(move || {
            if let Some(shell) = weak.upgrade() {
                shell.refresh_sidebar();
            }
        });
    }
    {
        let weak = Rc::downgrade(&shell);
        shell.sidebar.connect_retry(move || {
            if let Some(shell) = weak.upgrade() {
                shell.load();
            }
        });
    }
    {
        let weak = Rc::downgrade(&shell);
        shell.pane.connect_back(move || {
            if let Some(shell) = weak.upgrade() {
                shell.navigate(Route::Messages);
            }
        });
    }
    {
        let weak = Rc::downgrade(&shell);
        new_chat_btn.connect_clicked(move |_| {
            if let Some(shell) = weak.upgrade() {
                let route = shell.list.borrow().create_route();
                shell.navigate(route);
            }
        });
    }
    {
        let weak = Rc::downgrade(&shell);
        logout_btn.connect_clicked(move |_| {
            if let Some(shell) = weak.upgrade() {
                shell.logout();
            }
        });
    }

    // handlers above only hold weak refs; this one keeps the shell alive
    {
        let shell = shell.clone();
        window.connect_destroy(move |_| {
            shell.pane.close();
        });
    }

    window.present();
    shell.load();
}
