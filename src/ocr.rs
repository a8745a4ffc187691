// 📷 OCR collaborator seam
//
// Image decoding, preprocessing and character recognition live outside this
// crate. What lives here is the contract a recognizer implements, the
// dark-background decision recognizers share, and the time budget for a call.

use crate::config::OcrConfig;
use crate::error::ScanError;
use anyhow::Result;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Anything that can turn receipt image bytes into raw text.
///
/// Implementations are expected to apply `should_invert` with
/// `config.dark_background_threshold` to the decoded grayscale image before
/// recognition.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &[u8], config: &OcrConfig) -> Result<String>;
}

/// Mean luminance (0-255) of a grayscale buffer; 0 for an empty buffer
pub fn mean_luminance(luma: &[u8]) -> f64 {
    if luma.is_empty() {
        return 0.0;
    }
    let sum: u64 = luma.iter().map(|&p| u64::from(p)).sum();
    sum as f64 / luma.len() as f64
}

/// Light text on a dark background reads badly; invert when the mean
/// luminance falls below `threshold`.
pub fn should_invert(luma: &[u8], threshold: u8) -> bool {
    !luma.is_empty() && mean_luminance(luma) < f64::from(threshold)
}

/// Time budget for recognizing an image of `image_len` bytes
pub fn ocr_timeout(image_len: usize, config: &OcrConfig) -> Duration {
    let megabytes = image_len.div_ceil(1024 * 1024) as u64;
    Duration::from_millis(
        config
            .timeout_base_ms
            .saturating_add(config.timeout_per_megabyte_ms.saturating_mul(megabytes)),
    )
}

/// Run the recognizer on a worker thread and give up after `timeout`.
///
/// A recognizer that overruns is abandoned, not killed: its thread finishes
/// in the background and the late result is dropped.
pub fn recognize_with_timeout(
    recognizer: Arc<dyn TextRecognizer>,
    image: Vec<u8>,
    config: OcrConfig,
    timeout: Duration,
) -> Result<String, ScanError> {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("ocr-worker".to_string())
        .spawn(move || {
            let _ = tx.send(recognizer.recognize(&image, &config));
        })
        .map_err(|e| ScanError::Ocr(format!("could not start OCR worker: {}", e)))?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ScanError::Ocr(e.to_string())),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(ScanError::OcrTimeout(timeout)),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(ScanError::Ocr("OCR worker exited without a result".to_string()))
        }
    }
}
