//! Sequential batch processing
//!
//! Documents are processed one at a time in upload order. Every document
//! gets exactly one outcome; a failure is recorded and the loop moves on,
//! so one bad file never blocks the rest of the batch.

use crate::asset::ImageAsset;
use crate::compose;
use crate::config::PlacementConfig;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// Suffix substituted for the `.pdf` extension of successful outputs. Kept
/// byte-for-byte stable; downstream automation matches on it.
const OUTPUT_SUFFIX: &str = "_with_image.pdf";

/// One uploaded document: display name plus raw bytes.
#[derive(Debug, Clone)]
pub struct InputDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Per-document processing statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StampMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub pages_stamped: u32,
    pub processing_time_ms: u64,
}

/// Success payload or human-readable failure, never both.
#[derive(Debug, Clone)]
pub enum ProcessingResult {
    Stamped {
        output_name: String,
        bytes: Vec<u8>,
        metrics: StampMetrics,
    },
    Failed {
        message: String,
    },
}

/// Outcome for a single input document, keyed by its original name.
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub source_name: String,
    pub result: ProcessingResult,
}

impl DocumentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, ProcessingResult::Stamped { .. })
    }
}

/// Derive the output filename: `report.pdf` becomes
/// `report_with_image.pdf`; names without the extension get the suffix
/// appended.
pub fn output_name(source: &str) -> String {
    let stem = source.strip_suffix(".pdf").unwrap_or(source);
    format!("{}{}", stem, OUTPUT_SUFFIX)
}

/// Stamp `image` onto every document, returning one outcome per input in
/// the original order.
pub fn process_batch(
    documents: &[InputDocument],
    image: &ImageAsset,
    config: &PlacementConfig,
) -> Vec<DocumentOutcome> {
    documents
        .iter()
        .map(|doc| {
            let started = Instant::now();
            let result = match compose::attach_image(&doc.bytes, image, config) {
                Ok(output) => {
                    let metrics = StampMetrics {
                        input_size_bytes: doc.bytes.len(),
                        output_size_bytes: output.bytes.len(),
                        page_count: output.page_count,
                        pages_stamped: output.pages_stamped,
                        processing_time_ms: started.elapsed().as_millis() as u64,
                    };
                    info!(
                        name = %doc.name,
                        pages = output.page_count,
                        stamped = output.pages_stamped,
                        elapsed_ms = metrics.processing_time_ms,
                        "document stamped"
                    );
                    ProcessingResult::Stamped {
                        output_name: output_name(&doc.name),
                        bytes: output.bytes,
                        metrics,
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(name = %doc.name, error = %message, "document failed");
                    ProcessingResult::Failed { message }
                }
            };
            DocumentOutcome {
                source_name: doc.name.clone(),
                result,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PageSelection, PlacementConfig, PositionPreset, SizeMode};
    use lopdf::{dictionary, Document, Object};
    use pretty_assertions::assert_eq;

    fn one_page_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn test_config() -> PlacementConfig {
        PlacementConfig {
            size: SizeMode::Scale { factor: 1.0 },
            position: PositionPreset::BottomRight,
            margin_x: 10.0,
            margin_y: 10.0,
            custom_x: 0.0,
            custom_y: 0.0,
            pages: PageSelection::All,
        }
    }

    #[test]
    fn test_output_name_replaces_pdf_extension() {
        assert_eq!(output_name("report.pdf"), "report_with_image.pdf");
    }

    #[test]
    fn test_output_name_without_extension_appends_suffix() {
        assert_eq!(output_name("scan-01"), "scan-01_with_image.pdf");
    }

    #[test]
    fn test_output_name_only_strips_trailing_extension() {
        assert_eq!(
            output_name("a.pdf.backup.pdf"),
            "a.pdf.backup_with_image.pdf"
        );
    }

    #[test]
    fn test_batch_isolates_failures() {
        let image = crate::asset::ImageAsset::test_fixture(100, 100, 72.0, 72.0);
        let docs = vec![
            InputDocument {
                name: "good1.pdf".into(),
                bytes: one_page_pdf(),
            },
            InputDocument {
                name: "broken.pdf".into(),
                bytes: b"definitely not a pdf".to_vec(),
            },
            InputDocument {
                name: "good2.pdf".into(),
                bytes: one_page_pdf(),
            },
        ];

        let outcomes = process_batch(&docs, &image, &test_config());

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_success());
        assert!(!outcomes[1].is_success());
        assert!(outcomes[2].is_success());

        match &outcomes[1].result {
            ProcessingResult::Failed { message } => assert!(!message.is_empty()),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(outcomes[1].source_name, "broken.pdf");
    }

    #[test]
    fn test_batch_preserves_input_order_and_metrics() {
        let image = crate::asset::ImageAsset::test_fixture(50, 50, 72.0, 72.0);
        let docs = vec![
            InputDocument {
                name: "b.pdf".into(),
                bytes: one_page_pdf(),
            },
            InputDocument {
                name: "a.pdf".into(),
                bytes: one_page_pdf(),
            },
        ];

        let outcomes = process_batch(&docs, &image, &test_config());
        let names: Vec<&str> = outcomes.iter().map(|o| o.source_name.as_str()).collect();
        assert_eq!(names, vec!["b.pdf", "a.pdf"]);

        match &outcomes[0].result {
            ProcessingResult::Stamped { metrics, .. } => {
                assert_eq!(metrics.page_count, 1);
                assert_eq!(metrics.pages_stamped, 1);
                assert!(metrics.output_size_bytes > 0);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }
}
