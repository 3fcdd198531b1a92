// Document loading tests
//
// Test PDFs are generated in memory with lopdf to avoid fixture files.

use lopdf::{Document, Object, Stream, dictionary};
use pdf_resize::error::ResizeError;
use pdf_resize::pdf::page::PageContent;
use pdf_resize::pdf::reader::{PdfReader, load};

const NO_LIMIT: usize = usize::MAX;

/// Build a PDF whose pages have the given MediaBox sizes.
///
/// MediaBox and Resources sit on the Pages node so that pages inherit them
/// unless `own_media_box` is set.
fn create_test_pdf(sizes: &[(i64, i64)], own_media_box: bool) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for (i, &(w, h)) in sizes.iter().enumerate() {
        let content = format!("BT /F1 24 Tf 72 72 Td (Page {}) Tj ET", i + 1);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if own_media_box {
            page.set(
                "MediaBox",
                vec![0.into(), 0.into(), Object::Integer(w), Object::Integer(h)],
            );
        }
        kids.push(doc.add_object(page).into());
    }

    let (w, h) = sizes.first().copied().unwrap_or((612, 792));
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => sizes.len() as i64,
        "MediaBox" => vec![0.into(), 0.into(), Object::Integer(w), Object::Integer(h)],
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("save test PDF");
    buf
}

#[test]
fn test_load_two_page_document() {
    let bytes = create_test_pdf(&[(612, 792), (612, 792)], true);
    let document = load(&bytes, NO_LIMIT).expect("should load");

    assert_eq!(document.page_count(), 2);
    for page in document.pages() {
        assert_eq!(page.width, 612.0);
        assert_eq!(page.height, 792.0);
        assert!(matches!(page.content, PageContent::Source(_)));
    }
}

#[test]
fn test_load_preserves_page_order() {
    let bytes = create_test_pdf(&[(100, 200), (300, 400), (500, 600)], true);
    let document = load(&bytes, NO_LIMIT).expect("should load");

    let sizes: Vec<(f64, f64)> = document.pages().iter().map(|p| (p.width, p.height)).collect();
    assert_eq!(sizes, vec![(100.0, 200.0), (300.0, 400.0), (500.0, 600.0)]);

    let numbers: Vec<u32> = document
        .pages()
        .iter()
        .map(|p| match &p.content {
            PageContent::Source(src) => src.number,
            _ => panic!("expected source page"),
        })
        .collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

/// MediaBox and Resources inherited from the Pages node are resolved.
#[test]
fn test_inherited_media_box_and_resources() {
    let bytes = create_test_pdf(&[(595, 842)], false);
    let reader = PdfReader::from_bytes(&bytes, NO_LIMIT).expect("should parse");

    let (w, h) = reader.page_dimensions(1).expect("dimensions");
    assert_eq!((w, h), (595.0, 842.0));

    let resources = reader.page_resources(1).expect("resources");
    assert!(resources.is_some(), "inherited Resources should be found");
}

#[test]
fn test_empty_input_is_parse_failure() {
    let result = load(&[], NO_LIMIT);
    assert!(matches!(result, Err(ResizeError::ParseFailure(_))));
}

#[test]
fn test_truncated_header_is_parse_failure() {
    let result = load(b"%PD", NO_LIMIT);
    assert!(matches!(result, Err(ResizeError::ParseFailure(_))));
}

#[test]
fn test_garbage_input_is_parse_failure() {
    let result = load(b"this is definitely not a PDF document", NO_LIMIT);
    assert!(matches!(result, Err(ResizeError::ParseFailure(_))));
}

/// A valid header followed by a body cut off mid-way must not panic.
#[test]
fn test_truncated_body_is_parse_failure() {
    let bytes = create_test_pdf(&[(612, 792)], true);
    let truncated = &bytes[..bytes.len() / 3];
    let result = load(truncated, NO_LIMIT);
    assert!(
        matches!(result, Err(ResizeError::ParseFailure(_))),
        "expected ParseFailure, got: {:?}",
        result.err()
    );
}

#[test]
fn test_size_limit_is_parse_failure() {
    let bytes = create_test_pdf(&[(612, 792)], true);
    let result = load(&bytes, bytes.len() - 1);
    match result {
        Err(ResizeError::ParseFailure(msg)) => assert!(msg.contains("limit"), "got: {msg}"),
        other => panic!("expected ParseFailure, got: {:?}", other.err()),
    }

    assert!(load(&bytes, bytes.len()).is_ok(), "exact limit should load");
}

#[test]
fn test_zero_page_document_is_parse_failure() {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => Vec::<Object>::new(),
        "Count" => 0,
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save");

    let result = load(&bytes, NO_LIMIT);
    assert!(matches!(result, Err(ResizeError::ParseFailure(_))));
}

#[test]
fn test_rotation_is_normalized() {
    let mut doc = Document::load_mem(&create_test_pdf(&[(612, 792)], true)).expect("load");
    let page_id = *doc.get_pages().get(&1).expect("page 1");
    doc.get_dictionary_mut(page_id)
        .expect("page dict")
        .set("Rotate", -90);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save");

    let reader = PdfReader::from_bytes(&bytes, NO_LIMIT).expect("parse");
    assert_eq!(reader.page_rotation(1).expect("rotation"), 270);

    let document = reader.into_document(bytes.clone()).expect("document");
    assert_eq!(document.pages()[0].displayed_size(), (792.0, 612.0));
}

#[test]
fn test_missing_page_number_is_error() {
    let bytes = create_test_pdf(&[(612, 792)], true);
    let reader = PdfReader::from_bytes(&bytes, NO_LIMIT).expect("parse");
    assert!(reader.page_dimensions(2).is_err());
    assert_eq!(reader.page_count(), 1);
}

/// Set `CropBox` on the Pages node (inherited) or on page 1.
fn with_crop_box(bytes: &[u8], crop: [i64; 4], on_parent: bool) -> Vec<u8> {
    let mut doc = Document::load_mem(bytes).expect("load");
    let page_id = *doc.get_pages().get(&1).expect("page 1");
    let target = if on_parent {
        doc.get_dictionary(page_id)
            .and_then(|d| d.get(b"Parent"))
            .and_then(Object::as_reference)
            .expect("Parent")
    } else {
        page_id
    };
    let value: Vec<Object> = crop.iter().map(|&v| Object::Integer(v)).collect();
    doc.get_dictionary_mut(target)
        .expect("dict")
        .set("CropBox", value);
    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save");
    out
}

#[test]
fn test_inherited_crop_box_sets_page_size() {
    let bytes = with_crop_box(&create_test_pdf(&[(612, 792)], true), [36, 36, 576, 756], true);
    let document = load(&bytes, NO_LIMIT).expect("load");

    let page = &document.pages()[0];
    assert_eq!((page.width, page.height), (540.0, 720.0));
    match &page.content {
        PageContent::Source(src) => {
            assert_eq!(src.media_box.width(), 612.0);
            assert_eq!((src.crop_box.x0, src.crop_box.y0), (36.0, 36.0));
        }
        _ => panic!("expected source page"),
    }
}

#[test]
fn test_crop_box_is_clipped_to_media_box() {
    let bytes = with_crop_box(&create_test_pdf(&[(612, 792)], true), [-100, 0, 306, 900], false);
    let reader = PdfReader::from_bytes(&bytes, NO_LIMIT).expect("parse");
    let crop = reader.crop_box(1).expect("crop box");
    assert_eq!((crop.x0, crop.y0, crop.x1, crop.y1), (0.0, 0.0, 306.0, 792.0));
}

#[test]
fn test_crop_box_outside_media_box_falls_back() {
    let bytes = with_crop_box(&create_test_pdf(&[(612, 792)], true), [700, 800, 900, 1000], false);
    let reader = PdfReader::from_bytes(&bytes, NO_LIMIT).expect("parse");
    assert_eq!(reader.page_dimensions(1).expect("dimensions"), (612.0, 792.0));
}
