mod api;
mod app;
mod bus;
mod config;
mod domain;
mod feed;

use app::{APP_NAME, RelocateApp};
use eframe::NativeOptions;
use tracing_subscriber::EnvFilter;

fn main() -> eframe::Result<()> {
    init_tracing();

    let options = NativeOptions::default();
    eframe::run_native(
        APP_NAME,
        options,
        Box::new(|cc| Ok(Box::new(RelocateApp::new(cc)))),
    )
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("relocate=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
