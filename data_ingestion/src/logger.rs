use env_logger::{Builder, Env};
use std::io::Write;

/// Timestamped `env_logger`; `RUST_LOG` overrides the default `info` level.
pub fn init_logger() {
    let _ = Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {} - {}",
                buf.timestamp_seconds(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();
}
