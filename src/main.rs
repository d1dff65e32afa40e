use std::path::PathBuf;

use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};
use wlnest::{
    backend::{DeviceId, DeviceKind, InputDevice, InputEvent},
    headless::{HeadlessDisplay, TracingSeat},
    server::{run_dispatch_loop, ControlFlags, WaylandLock},
    Wlnest,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging();

    let flags = ControlFlags::new();
    flags.register_signals()?;

    let display = HeadlessDisplay::new()?;
    let mut server = Wlnest::new(TracingSeat);

    // A headless run still announces a keyboard, the way a privileged run
    // would get one from the session backend.
    server.process_input_event(InputEvent::DeviceAdded {
        device: InputDevice {
            id: DeviceId(0),
            kind: DeviceKind::Keyboard,
            name: String::from("headless-keyboard"),
        },
    });

    let lock = WaylandLock::new(server, display);

    tracing::info!("running headless, SIGTERM/SIGINT to stop, SIGUSR2 for screenshot");
    run_dispatch_loop(lock, flags)?;

    Ok(())
}

pub fn logging() {
    if std::env::var("WLNEST_LOG").is_err() {
        std::env::set_var("WLNEST_LOG", "none,wlnest=debug");
    }

    let journald_layer = tracing_journald::layer().ok();

    let home_dir = std::env::var("HOME").unwrap_or_else(|_| String::from("/tmp"));
    let logs_dir = PathBuf::from(home_dir).join(".cache/wlnest/logs/");

    // Log all `tracing` events to files prefixed with `debug`. Since these
    // files will be written to very frequently, roll the log file every minute.
    let debug_file = tracing_appender::rolling::minutely(&logs_dir, "debug");
    // Log warnings and errors to a separate file. Since we expect these events
    // to occur less frequently, roll that file on a daily basis instead.
    let warn_file = tracing_appender::rolling::daily(&logs_dir, "warnings");

    tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_env_var("WLNEST_LOG")
                .with_default_directive(LevelFilter::ERROR.into())
                .from_env_lossy(),
        )
        .with(
            tracing_subscriber::fmt::Layer::default()
                .with_writer(debug_file.with_max_level(Level::DEBUG))
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::fmt::Layer::default()
                .with_writer(warn_file.with_max_level(Level::WARN))
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::fmt::Layer::default()
                .with_writer(std::io::stdout.with_max_level(Level::DEBUG)),
        )
        .with(journald_layer)
        .init();
}
