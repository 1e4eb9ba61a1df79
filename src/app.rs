use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use eframe::{
    App, CreationContext, Frame,
    egui::{self, Context, Layout},
};
use tracing::{info, warn};

use crate::{
    api::{ApiClient, NotificationSource},
    bus::MutationBus,
    config::{Settings, SettingsStore},
    domain::Category,
    feed::{CardView, Feed, FeedPhase},
};

pub const APP_NAME: &str = "Relocate";

const TOAST_TTL: Duration = Duration::from_secs(4);
const PREVIEW_LIMIT: usize = 5;
const SKELETON_ROWS: usize = 3;

pub struct RelocateApp {
    settings_form: SettingsForm,
    settings: Settings,
    store: Option<SettingsStore>,
    storage_warning: Option<String>,
    global_error: Option<String>,
    bus: MutationBus,
    source: Option<Arc<dyn NotificationSource>>,
    active_tab: Category,
    feed: Option<Feed>,
    preview: Option<Feed>,
    toasts: Toasts,
}

impl RelocateApp {
    pub fn new(_cc: &CreationContext<'_>) -> Self {
        let mut app = Self {
            settings_form: SettingsForm::default(),
            settings: Settings::default(),
            store: None,
            storage_warning: None,
            global_error: None,
            bus: MutationBus::default(),
            source: None,
            active_tab: Category::All,
            feed: None,
            preview: None,
            toasts: Toasts::default(),
        };

        match SettingsStore::initialize() {
            Ok(store) => {
                match store.load() {
                    Ok(settings) => app.settings = settings,
                    Err(err) => {
                        app.storage_warning =
                            Some(format!("Failed to restore saved settings: {err}"))
                    }
                }
                app.store = Some(store);
            }
            Err(err) => {
                app.storage_warning = Some(format!(
                    "Local settings storage is unavailable; changes will not be persisted ({err})."
                ));
            }
        }

        app.settings_form = SettingsForm::from_settings(&app.settings);
        app.connect();
        app
    }

    /// Rebuilds the API client and re-mounts every feed against it.
    fn connect(&mut self) {
        self.feed = None;
        self.preview = None;
        self.source = None;

        if self.settings.access_token.trim().is_empty() {
            self.global_error =
                Some("Add your access token in Settings to load notifications.".to_owned());
            return;
        }

        match ApiClient::new(&self.settings) {
            Ok(client) => {
                self.global_error = None;
                self.source = Some(Arc::new(client));
                self.mount_active_tab();
                self.preview = self.mount(Category::All, PREVIEW_LIMIT);
            }
            Err(err) => {
                warn!(error = %err, "failed to build API client");
                self.global_error = Some(format!("Unable to reach the backend: {err}"));
            }
        }
    }

    fn mount(&self, category: Category, page_size: usize) -> Option<Feed> {
        let source = self.source.as_ref()?;
        Some(Feed::mount(category, page_size, Arc::clone(source), self.bus.clone()))
    }

    fn mount_active_tab(&mut self) {
        self.feed = self.mount(self.active_tab, self.settings.page_size);
    }

    fn select_tab(&mut self, category: Category) {
        if self.active_tab == category && self.feed.is_some() {
            return;
        }
        self.active_tab = category;
        self.mount_active_tab();
    }

    fn save_settings(&mut self) {
        let settings = match self.settings_form.validate(&self.settings) {
            Ok(settings) => settings,
            Err(message) => {
                self.settings_form.form_error = Some(message);
                return;
            }
        };

        if let Some(store) = &self.store {
            if let Err(err) = store.save(&settings) {
                self.settings_form.form_error = Some(format!("Unable to save settings: {err}"));
                return;
            }
            info!(path = %store.path().display(), "settings saved");
        }

        self.settings_form.form_error = None;
        self.settings = settings;
        self.connect();
    }

    fn poll_feeds(&mut self) {
        for feed in [self.feed.as_mut(), self.preview.as_mut()].into_iter().flatten() {
            feed.poll();
            for notice in feed.take_notices() {
                self.toasts.push(notice);
            }
        }
        self.toasts.prune(TOAST_TTL);
    }

    fn render_side_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Settings");
        ui.separator();

        if let Some(warning) = &self.storage_warning {
            ui.colored_label(ui.visuals().warn_fg_color, warning);
            ui.separator();
        }

        ui.label("Backend URL");
        ui.text_edit_singleline(&mut self.settings_form.api_base_url);

        ui.label("Access token");
        ui.add(
            egui::TextEdit::singleline(&mut self.settings_form.access_token)
                .password(true)
                .hint_text("eyJ..."),
        );

        if ui.button("Save & reconnect").clicked() {
            self.save_settings();
        }

        if let Some(error) = &self.settings_form.form_error {
            ui.colored_label(ui.visuals().error_fg_color, error);
        }

        ui.separator();
        let Some(preview) = &mut self.preview else {
            ui.weak("Not connected.");
            return;
        };
        ui.horizontal(|row| {
            row.strong("Recent activity");
            let unread = preview.unread_count();
            if unread > 0 {
                row.weak(format!("{unread} unread"));
            }
        });
        render_preview(ui, preview);
    }

    fn render_dashboard(&mut self, ui: &mut egui::Ui) {
        ui.heading("Notifications");
        ui.add_space(6.0);

        let mut selected = None;
        ui.horizontal(|row| {
            for category in Category::TABS {
                if row
                    .selectable_label(self.active_tab == category, category.label())
                    .clicked()
                {
                    selected = Some(category);
                }
            }
        });
        if let Some(category) = selected {
            self.select_tab(category);
        }
        ui.separator();

        if let Some(error) = &self.global_error {
            ui.colored_label(ui.visuals().error_fg_color, error);
            ui.add_space(8.0);
        }

        if let Some(feed) = &mut self.feed {
            if !feed.items().is_empty() {
                let more = if feed.has_more() { ", more available" } else { "" };
                ui.weak(format!(
                    "{} loaded across {} page(s){more}",
                    feed.items().len(),
                    feed.page()
                ));
            }
            render_feed(ui, feed);
        }
    }

    fn any_loading(&self) -> bool {
        [self.feed.as_ref(), self.preview.as_ref()]
            .into_iter()
            .flatten()
            .any(Feed::is_loading)
    }
}

impl App for RelocateApp {
    fn update(&mut self, ctx: &Context, _frame: &mut Frame) {
        self.poll_feeds();

        egui::SidePanel::left("settings_panel")
            .default_width(280.0)
            .show(ctx, |ui| self.render_side_panel(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_dashboard(ui);
        });

        self.toasts.show(ctx);

        let cadence = if self.any_loading() || !self.toasts.is_empty() {
            Duration::from_millis(100)
        } else {
            Duration::from_millis(500)
        };
        ctx.request_repaint_after(cadence);
    }
}

// -----------------------------------------------------------------------------
// Feed rendering
// -----------------------------------------------------------------------------

enum CardAction {
    MarkRead(String),
    Delete(String),
    ShowLess(String),
    Retry,
}

fn render_feed(ui: &mut egui::Ui, feed: &mut Feed) {
    let phase = feed.phase();
    match phase {
        FeedPhase::LoadingFirstPage => {
            draw_skeleton(ui);
            return;
        }
        FeedPhase::Failed => {
            let message = feed.last_error().unwrap_or("Something went wrong.").to_owned();
            ui.vertical_centered(|center| {
                center.add_space(40.0);
                center.colored_label(
                    center.visuals().error_fg_color,
                    format!("Failed to load {}: {message}", feed.category().noun()),
                );
                if center.button("Try again").clicked() {
                    feed.retry();
                }
            });
            return;
        }
        FeedPhase::Empty => {
            ui.vertical_centered(|center| {
                center.add_space(80.0);
                center.heading("🔔");
                center.weak(feed.category().empty_text());
            });
            return;
        }
        _ => {}
    }

    let mut actions = Vec::new();
    let mut sentinel = None;
    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |area| {
            for card in feed.cards(Utc::now()) {
                let response = draw_card(area, &card, &mut actions);
                if card.is_last {
                    sentinel = Some((card.record.id.clone(), area.is_rect_visible(response.rect)));
                }
                area.add_space(6.0);
            }

            match phase {
                FeedPhase::LoadingMore => {
                    area.vertical_centered(|center| {
                        center.spinner();
                    });
                }
                FeedPhase::Stalled => {
                    area.horizontal(|row| {
                        row.colored_label(row.visuals().error_fg_color, "Couldn't load more.");
                        if row.small_button("Retry").clicked() {
                            actions.push(CardAction::Retry);
                        }
                    });
                }
                FeedPhase::Populated { has_more: false } => {
                    area.vertical_centered(|center| {
                        center.weak("You're all caught up 🎉");
                    });
                }
                _ => {}
            }
        });

    if let Some((id, visible)) = sentinel {
        feed.observe_last_item(&id);
        feed.report_visibility(&id, visible);
    }
    apply_actions(feed, actions);
}

fn render_preview(ui: &mut egui::Ui, feed: &mut Feed) {
    match feed.phase() {
        FeedPhase::LoadingFirstPage => {
            ui.spinner();
            return;
        }
        FeedPhase::Failed => {
            if ui.small_button("Retry").clicked() {
                feed.retry();
            }
            return;
        }
        FeedPhase::Empty => {
            ui.weak("Nothing new.");
            return;
        }
        _ => {}
    }

    let mut actions = Vec::new();
    for card in feed.cards(Utc::now()).iter().take(PREVIEW_LIMIT) {
        let record = card.record;
        ui.horizontal_wrapped(|row| {
            if card.is_unread {
                row.colored_label(row.visuals().selection.bg_fill, "●");
            }
            row.label(record.summary());
            row.weak(&card.time_ago);
            if card.is_unread && row.small_button("Read").clicked() {
                actions.push(CardAction::MarkRead(record.id.clone()));
            }
        });
    }
    apply_actions(feed, actions);
}

fn draw_card(
    ui: &mut egui::Ui,
    card: &CardView<'_>,
    actions: &mut Vec<CardAction>,
) -> egui::Response {
    let record = card.record;
    ui.group(|group| {
        group.set_width(group.available_width());
        group.horizontal(|row| {
            if card.is_unread {
                row.colored_label(row.visuals().selection.bg_fill, "●");
            }
            let kind = row.strong(record.kind.label());
            if let Some(reference) = record.reference_id() {
                kind.on_hover_text(format!("ref {reference}"));
            }
            row.weak(&card.time_ago);
            row.with_layout(Layout::right_to_left(egui::Align::Center), |lane| {
                if lane.small_button("Delete").clicked() {
                    actions.push(CardAction::Delete(record.id.clone()));
                }
                if !record.demoted && lane.small_button("Show less").clicked() {
                    actions.push(CardAction::ShowLess(record.id.clone()));
                }
                if card.is_unread && lane.small_button("Mark as read").clicked() {
                    actions.push(CardAction::MarkRead(record.id.clone()));
                }
            });
        });
        if record.demoted {
            group.weak("We'll show fewer notifications like this.");
        } else {
            group.label(record.summary());
        }
    })
    .response
}

fn draw_skeleton(ui: &mut egui::Ui) {
    for _ in 0..SKELETON_ROWS {
        ui.group(|group| {
            group.set_width(group.available_width());
            group.horizontal(|row| {
                row.spinner();
                row.weak("Loading…");
            });
            group.add_space(18.0);
        });
        ui.add_space(6.0);
    }
}

fn apply_actions(feed: &mut Feed, actions: Vec<CardAction>) {
    for action in actions {
        match action {
            CardAction::MarkRead(id) => feed.mark_as_read(&id),
            CardAction::Delete(id) => feed.delete_item(&id),
            CardAction::ShowLess(id) => feed.demote_item(&id),
            CardAction::Retry => feed.retry(),
        }
    }
}

// -----------------------------------------------------------------------------
// Supporting structs
// -----------------------------------------------------------------------------

#[derive(Default)]
struct SettingsForm {
    api_base_url: String,
    access_token: String,
    form_error: Option<String>,
}

impl SettingsForm {
    fn from_settings(settings: &Settings) -> Self {
        Self {
            api_base_url: settings.api_base_url.clone(),
            access_token: settings.access_token.clone(),
            form_error: None,
        }
    }

    fn validate(&self, current: &Settings) -> Result<Settings, String> {
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err("The backend URL must start with http:// or https://.".to_owned());
        }
        let token = self.access_token.trim();
        if token.is_empty() {
            return Err("An access token is required.".to_owned());
        }
        Ok(Settings {
            api_base_url: url.to_owned(),
            access_token: token.to_owned(),
            ..current.clone()
        })
    }
}

/// Short-lived, non-blocking messages shown in the bottom-right corner.
#[derive(Default)]
struct Toasts {
    entries: Vec<(String, Instant)>,
}

impl Toasts {
    fn push(&mut self, message: String) {
        self.entries.push((message, Instant::now()));
    }

    fn prune(&mut self, ttl: Duration) {
        self.entries.retain(|(_, raised)| raised.elapsed() < ttl);
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn show(&self, ctx: &Context) {
        if self.entries.is_empty() {
            return;
        }
        egui::Area::new(egui::Id::new("toasts"))
            .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-12.0, -12.0))
            .show(ctx, |ui| {
                for (message, _) in &self.entries {
                    egui::Frame::popup(ui.style()).show(ui, |toast| {
                        toast.colored_label(toast.visuals().error_fg_color, message);
                    });
                }
            });
    }
}
