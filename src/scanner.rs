// 🧾 Receipt Scanner - image or text in, judgement out
//
// Glues the stages together:
//   image → (OCR collaborator, time-boxed) → text → extractor → engine

use crate::config::OcrConfig;
use crate::error::ScanError;
use crate::extractor::{ExtractedFields, TextFieldExtractor};
use crate::logging::text_digest;
use crate::ocr::{ocr_timeout, recognize_with_timeout, TextRecognizer};
use crate::reconciliation::{ReconciliationEngine, ReconciliationResult};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// What a scan produced: the fields that were read and the judgement.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    /// Digest of the OCR text, for correlating logs without the text itself
    pub text_digest: String,
    pub fields: ExtractedFields,
    pub result: ReconciliationResult,
}

pub struct ReceiptScanner {
    recognizer: Arc<dyn TextRecognizer>,
    extractor: TextFieldExtractor,
    engine: ReconciliationEngine,
    ocr: OcrConfig,
}

impl ReceiptScanner {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        engine: ReconciliationEngine,
        ocr: OcrConfig,
    ) -> Self {
        ReceiptScanner {
            recognizer,
            extractor: TextFieldExtractor::new(),
            engine,
            ocr,
        }
    }

    pub fn with_extractor(mut self, extractor: TextFieldExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    /// Recognize, extract and reconcile one receipt image
    pub fn scan_image(&self, image: &[u8], agent_id: &str) -> Result<ScanOutcome, ScanError> {
        let timeout = ocr_timeout(image.len(), &self.ocr);
        let started = Instant::now();

        let text = recognize_with_timeout(
            Arc::clone(&self.recognizer),
            image.to_vec(),
            self.ocr.clone(),
            timeout,
        )?;

        debug!(
            agent_id,
            image_bytes = image.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "OCR finished"
        );

        self.scan_text(&text, agent_id)
    }

    /// Extract and reconcile text that was already recognized
    pub fn scan_text(&self, text: &str, agent_id: &str) -> Result<ScanOutcome, ScanError> {
        let digest = text_digest(text);
        let fields = self.extractor.extract(text);
        let result = self.engine.reconcile(&fields, agent_id)?;

        info!(agent_id, text_digest = %digest, outcome = result.code(), "receipt scanned");

        Ok(ScanOutcome {
            text_digest: digest,
            fields,
            result,
        })
    }
}
