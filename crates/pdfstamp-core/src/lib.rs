//! Stamp a raster image onto selected pages of PDF batches
//!
//! The pipeline is two stateless layers:
//! - [`placement::resolve`] turns user parameters plus a page's dimensions
//!   into the exact rectangle the image renders at.
//! - [`compose::attach_image`] merges the image onto each selected page of a
//!   document, leaving other pages untouched.
//!
//! [`batch::process_batch`] drives both over a list of uploads and
//! [`archive::bundle_outputs`] packages the results for download. All inputs
//! are treated as already-buffered bytes; there is no persistence and no
//! service state.

pub mod archive;
pub mod asset;
pub mod batch;
pub mod compose;
pub mod config;
pub mod error;
pub mod placement;

pub use archive::{bundle_outputs, BatchDownload, ARCHIVE_NAME};
pub use asset::{ImageAsset, DEFAULT_DPI};
pub use batch::{output_name, process_batch, DocumentOutcome, InputDocument, ProcessingResult};
pub use compose::attach_image;
pub use config::{PageSelection, PlacementConfig, PositionPreset, SizeMode};
pub use error::PdfStampError;
pub use placement::{resolve, ResolvedPlacement};

/// Parse PDF bytes and return the page count.
pub fn page_count(bytes: &[u8]) -> Result<u32, PdfStampError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| PdfStampError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object};

    fn blank_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => Object::Reference(pages_id),
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                });
                Object::Reference(page_id)
            })
            .collect();
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
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

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(&blank_pdf(1)).unwrap(), 1);
        assert_eq!(page_count(&blank_pdf(4)).unwrap(), 4);
    }

    #[test]
    fn test_page_count_rejects_garbage() {
        assert!(matches!(
            page_count(b"nope"),
            Err(PdfStampError::ParseError(_))
        ));
    }
}
