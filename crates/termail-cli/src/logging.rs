use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::context::xdg_state_dir;

const CRATES: [&str; 4] = ["termail", "termail_core", "termail_content", "termail_mail"];

fn log_path() -> PathBuf {
    xdg_state_dir().join("termail").join("termail.log")
}

fn crate_filter(level: &str) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(CRATES.iter().map(|name| format!("{}={}", name, level)));
    directives.join(",")
}

/// `TERMAIL_LOG` sends logs to a file using its value as the filter.
/// Otherwise logs go to stderr at `warn`, or `debug` with `--debug`.
pub(crate) fn init(debug: bool) {
    if let Ok(directive) = std::env::var("TERMAIL_LOG") {
        let path = log_path();
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(directive))
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
            return;
        }
    }

    let level = if debug { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(crate_filter(level)))
        .with_writer(std::io::stderr)
        .try_init();
}
