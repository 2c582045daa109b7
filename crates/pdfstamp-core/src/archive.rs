//! Download bundling
//!
//! A batch with one successful output is handed back as plain PDF bytes;
//! several successes are packed into a single deflate-compressed ZIP.
//! Failed documents are simply left out of the bundle.

use crate::batch::{DocumentOutcome, ProcessingResult};
use crate::error::PdfStampError;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;

/// Name of the archive handed to the user when several documents succeed.
pub const ARCHIVE_NAME: &str = "processed_pdfs.zip";

/// What the caller should offer for download after a batch.
#[derive(Debug, Clone)]
pub enum BatchDownload {
    /// Exactly one success: raw PDF bytes, no archiving.
    Single { name: String, bytes: Vec<u8> },
    /// Two or more successes packed into one ZIP.
    Archive { name: String, bytes: Vec<u8> },
    /// Nothing succeeded; there is nothing to download.
    Empty,
}

/// Bundle the successful outputs of a batch, preserving input order.
pub fn bundle_outputs(outcomes: &[DocumentOutcome]) -> Result<BatchDownload, PdfStampError> {
    let successes: Vec<(&str, &[u8])> = outcomes
        .iter()
        .filter_map(|outcome| match &outcome.result {
            ProcessingResult::Stamped {
                output_name, bytes, ..
            } => Some((output_name.as_str(), bytes.as_slice())),
            ProcessingResult::Failed { .. } => None,
        })
        .collect();

    match successes.as_slice() {
        [] => Ok(BatchDownload::Empty),
        [(name, bytes)] => Ok(BatchDownload::Single {
            name: name.to_string(),
            bytes: bytes.to_vec(),
        }),
        many => {
            let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
            let options = SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);

            for (name, bytes) in many {
                writer
                    .start_file(*name, options)
                    .map_err(|e| PdfStampError::ArchiveError(e.to_string()))?;
                writer
                    .write_all(bytes)
                    .map_err(|e| PdfStampError::ArchiveError(e.to_string()))?;
            }

            let cursor = writer
                .finish()
                .map_err(|e| PdfStampError::ArchiveError(e.to_string()))?;
            Ok(BatchDownload::Archive {
                name: ARCHIVE_NAME.to_string(),
                bytes: cursor.into_inner(),
            })
        }
    }
}
