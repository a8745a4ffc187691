// 📝 Structured logging
//
// Receipts carry account names and amounts. Raw OCR text is never logged;
// receipts are identified in logs by a digest of their text instead.

use sha2::{Digest, Sha256};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over `level`.
/// Calling it twice is harmless.
pub fn init_logger(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init();
}

/// Short, stable identifier for a receipt text (first 12 hex chars of SHA-256)
pub fn text_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..12].to_string()
}
