use std::rc::Rc;

use adw::prelude::*;
use adw::Application;
use gtk4 as gtk;
use log::{error, info};

use crate::api::client::ApiClient;
use crate::app::AppState;
use crate::session::Session;
use crate::ui::spawn_then;

pub fn show_login_window(app: &Application) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("HabitChat Login")
        .default_width(420)
        .default_height(320)
        .resizable(false)
        .build();

    let toast_overlay = adw::ToastOverlay::new();

    let root = gtk::Box::new(gtk::Orientation::Vertical, 12);
    root.set_margin_top(24);
    root.set_margin_bottom(24);
    root.set_margin_start(24);
    root.set_margin_end(24);

    let title = gtk::Label::new(Some("Sign in to your habits network"));
    title.add_css_class("title-2");
    title.set_halign(gtk::Align::Start);
    root.append(&title);

    let state = AppState::load();

    let server_entry = gtk::Entry::new();
    server_entry.set_placeholder_text(Some("Backend URL (e.g. https://api.example.com)"));
    server_entry.set_text(&state.base_url);
    server_entry.set_hexpand(true);

    let email_entry = gtk::Entry::new();
    email_entry.set_placeholder_text(Some("Email"));
    email_entry.set_input_purpose(gtk::InputPurpose::Email);

    let pass_entry = gtk::PasswordEntry::new();
    pass_entry.set_placeholder_text(Some("Password"));
    pass_entry.set_hexpand(true);

    let form = gtk::Box::new(gtk::Orientation::Vertical, 8);
    form.append(&server_entry);
    form.append(&email_entry);
    form.append(&pass_entry);
    root.append(&form);

    let status = gtk::Label::new(None);
    status.add_css_class("dim-label");
    status.set_halign(gtk::Align::Start);
    status.set_wrap(true);
    root.append(&status);

    let login_btn = gtk::Button::with_label("Sign in");
    login_btn.add_css_class("suggested-action");
    login_btn.set_halign(gtk::Align::End);
    root.append(&login_btn);

    toast_overlay.set_child(Some(&root));
    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let header_title = gtk::Label::new(Some("HabitChat"));
    header.set_title_widget(Some(&header_title));
    container.append(&header);
    container.append(&toast_overlay);
    window.set_content(Some(&container));

    let on_connect = {
        let app = app.clone();
        let window = window.clone();
        let overlay = toast_overlay.clone();
        let login_btn = login_btn.clone();
        let server_entry = server_entry.clone();
        let email_entry = email_entry.clone();
        let pass_entry = pass_entry.clone();
        move || {
            let url = crate::utils::normalize_url(&server_entry.text());
            let email = email_entry.text().to_string();
            let password = pass_entry.text().to_string();
            if server_entry.text().trim().is_empty() {
                overlay.add_toast(adw::Toast::new("Please enter the backend URL."));
                return;
            }
            let client = match ApiClient::new(&url) {
                Ok(c) => c,
                Err(e) => {
                    overlay.add_toast(adw::Toast::new(&e.to_string()));
                    return;
                }
            };

            status.set_label("Signing in...");
            login_btn.set_sensitive(false);

            let mut state = AppState::load();
            state.base_url = url;
            let session = Session::persistent(state);

            let status = status.clone();
            let app = app.clone();
            let window = window.clone();
            let overlay = overlay.clone();
            let login_btn = login_btn.clone();
            spawn_then(
                async move { session.login(&client, &email, &password).await },
                move |res| {
                    login_btn.set_sensitive(true);
                    match res {
                        Ok(()) => {
                            info!("login succeeded");
                            crate::ui::main_window::show_main_window(&app);
                            window.close();
                        }
                        Err(err) => {
                            error!("Login error: {}", err);
                            status.set_label(&err.to_string());
                            overlay.add_toast(adw::Toast::new(&err.to_string()));
                        }
                    }
                },
            );
        }
    };

    let on_connect: Rc<dyn Fn()> = Rc::new(on_connect);
    {
        let on_connect = on_connect.clone();
        login_btn.connect_clicked(move |_| (on_connect)());
    }
    {
        let on_connect = on_connect.clone();
        email_entry.connect_activate(move |_| (on_connect)());
    }
    {
        let on_connect = on_connect.clone();
        pass_entry.connect_activate(move |_| (on_connect)());
    }

    window.present();
}
