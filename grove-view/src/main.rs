//! Application entry point for the grove viewer.
//!
//! This binary installs a tracing subscriber, sets up eframe/egui and
//! delegates all interactive logic and rendering to [`Viewer`] from the
//! `viewer` module.

mod viewer;

use viewer::Viewer;

/// Starts the native eframe application.
///
/// Logging is controlled through `RUST_LOG` (e.g. `RUST_LOG=grove_core=debug`
/// to follow the automaton's merge and removal transitions).
fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let options = eframe::NativeOptions::default();

    eframe::run_native(
        "Grove",
        options,
        Box::new(|_cc| {
            // Construct the root app state for the viewer.
            Ok(Box::new(Viewer::default()))
        }),
    )
}
