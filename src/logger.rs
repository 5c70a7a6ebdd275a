use chrono::Local;
use env_logger::{Builder, Env};
use log::Level;
use std::io::{IsTerminal, Write};

const DEFAULT_FILTER: &str = "info";

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1b[31m\x1b[1m",
        Level::Warn => "\x1b[33m\x1b[1m",
        Level::Info => "\x1b[32m\x1b[1m",
        Level::Debug => "\x1b[36m\x1b[1m",
        Level::Trace => "\x1b[90m\x1b[1m",
    }
}

fn build_logger() -> Builder {
    // journald / 重定向到文件时不输出颜色码
    let colored = std::io::stderr().is_terminal();

    let mut builder = Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER));
    builder.format(move |buf, record| {
        let time = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let (color, reset) = if colored {
            (level_color(record.level()), "\x1b[0m")
        } else {
            ("", "")
        };
        writeln!(
            buf,
            "{} {}{:<5}{} [{}:{}] {}",
            time,
            color,
            record.level(),
            reset,
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args(),
        )
    });
    builder
}

/// Install the process-wide logger. `RUST_LOG` overrides the default `info` filter.
pub fn init_logger() {
    build_logger().init();
}

/// Logger for test binaries; repeated calls are ignored.
pub fn init_test_logger() {
    let _ = build_logger().is_test(true).try_init();
}
