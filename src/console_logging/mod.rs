// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Console logging for applications embedding the client. Filtering is read from the
//! `RUST_OPCUA_LOG` environment variable, e.g. `RUST_OPCUA_LOG=opcua_client=debug`.

use std::{
    fmt,
    io::Write,
    sync::atomic::{AtomicBool, Ordering},
};

use env_logger::{fmt::Color, Builder};

pub const LOG_ENV_VAR: &str = "RUST_OPCUA_LOG";

lazy_static! {
    static ref INITIALISED: AtomicBool = AtomicBool::new(false);
}

struct Pad<T> {
    value: T,
    width: usize,
}

impl<T: fmt::Display> fmt::Display for Pad<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{: <width$}", self.value, width = self.width)
    }
}

fn level_color(level: log::Level) -> (Color, Option<Color>) {
    match level {
        log::Level::Error => (Color::White, Some(Color::Red)),
        log::Level::Warn => (Color::Yellow, None),
        log::Level::Info => (Color::Cyan, None),
        log::Level::Debug => (Color::Green, None),
        log::Level::Trace => (Color::Ansi256(8), None),
    }
}

/// Installs the logger. Only the first call in a process has any effect.
pub fn init() {
    init_with_default_filter("info")
}

/// Installs the logger with a filter to use when `RUST_OPCUA_LOG` is not set.
pub fn init_with_default_filter(default_filter: &str) {
    if INITIALISED.swap(true, Ordering::Relaxed) {
        return;
    }
    // RUST_LOG is shared with cargo and other tools so the client has its own variable
    let env = env_logger::Env::new().filter_or(LOG_ENV_VAR, default_filter);
    let mut builder = Builder::from_env(env);
    builder.format(|f, record| {
        let time_fmt = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");

        let (fg, bg) = level_color(record.level());
        let mut style = f.style();
        style.set_color(fg);
        if let Some(bg) = bg {
            style.set_bg(bg);
        }
        let level = style.value(Pad {
            value: record.level(),
            width: 5,
        });

        let mut style = f.style();
        let target = style.set_bold(true).value(Pad {
            value: record.target(),
            width: 44,
        });

        let thread = std::thread::current();
        writeln!(
            f,
            "{} {} {} [{}] {}",
            time_fmt,
            level,
            target,
            thread.name().unwrap_or("-"),
            record.args()
        )
    });
    if builder.try_init().is_err() {
        warn!("A logger was already installed, console logging is not enabled");
    } else {
        info!(
            "Logging is enabled, use {} environment variable to control filtering, logging level",
            LOG_ENV_VAR
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init_with_default_filter("trace");
        assert!(INITIALISED.load(Ordering::Relaxed));
    }
}
