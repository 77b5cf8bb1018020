//! Plain-text extraction from PDF documents.

use std::path::Path;

use crate::error::ExtractError;

/// Extracts the text of every page, concatenated in page order.
///
/// A document lopdf cannot parse is a permanent failure — retrying will
/// not make the bytes well-formed. Pages whose text cannot be decoded
/// are skipped rather than failing the whole document.
pub fn extract_pdf_text(path: &Path) -> Result<String, ExtractError> {
    let _span = tracing::info_span!("extract.pdf").entered();

    let pdf_bytes = std::fs::read(path).map_err(|e| ExtractError::ReadDocument {
        path: path.to_path_buf(),
        source: e,
    })?;

    let doc = lopdf::Document::load_mem(&pdf_bytes)
        .map_err(|e| ExtractError::PdfParse(e.to_string()))?;

    let mut text = String::new();
    // get_pages is a BTreeMap keyed by page number, so iteration order
    // is document page order.
    for (page_num, _) in doc.get_pages() {
        if let Ok(page_text) = doc.extract_text(&[page_num]) {
            text.push_str(&page_text);
            text.push('\n');
        }
    }

    Ok(text)
}

/// Test fixture: builds minimal but well-formed PDF bytes. Public so
/// integration tests can use it; not part of the supported API.
#[doc(hidden)]
pub mod pdf_fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Builds a single-page PDF containing the given line of text.
    pub fn build_pdf(text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("fixture content stream encodes"),
        ));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("fixture document serializes");
        bytes
    }
}
