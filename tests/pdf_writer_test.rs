// Document assembly tests

use lopdf::content::Content;
use lopdf::{Document, Object, Stream, dictionary};
use pdf_resize::config::request::{ScaleFactor, ScalingStrategy};
use pdf_resize::error::ResizeError;
use pdf_resize::pdf::page::{self, Page, PageContent, RasterContent};
use pdf_resize::pdf::reader::{PdfReader, load};
use pdf_resize::pdf::writer::PageWriter;
use pdf_resize::pipeline::page_processor::{TransformOptions, transform_document};
use pdf_resize::render::UnavailableRasterizer;

/// Build a PDF with one page per size, each page labelled with its number,
/// plus an Info dictionary and an outline entry in the catalog.
fn create_test_pdf(sizes: &[(i64, i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for (i, &(w, h)) in sizes.iter().enumerate() {
        let content = format!("BT /F1 12 Tf 10 10 Td (P{}) Tj ET", i + 1);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Integer(w), Object::Integer(h)],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => sizes.len() as i64,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let outlines_id = doc.add_object(dictionary! {
        "Type" => "Outlines",
        "Count" => 0,
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "Outlines" => outlines_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("Quarterly report"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("save test PDF");
    buf
}

fn zlib(data: &[u8]) -> Vec<u8> {
    use std::io::Write;
    let mut encoder =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).expect("encode");
    encoder.finish().expect("finish")
}

fn vector_document(bytes: &[u8], factor: f64) -> page::Document {
    let document = load(bytes, usize::MAX).expect("load");
    transform_document(
        document,
        ScaleFactor::new(factor).expect("scale"),
        &TransformOptions {
            strategy: ScalingStrategy::VectorRedraw,
            max_raster_pixels: u64::MAX,
        },
        &UnavailableRasterizer,
    )
    .expect("transform")
}

/// Text drawn by each output page's form, in page order.
fn page_labels(doc: &Document) -> Vec<String> {
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let xobjects = doc
                .get_dictionary(page_id)
                .and_then(|page| page.get(b"Resources"))
                .and_then(Object::as_dict)
                .and_then(|resources| resources.get(b"XObject"))
                .and_then(Object::as_dict)
                .expect("XObject dict");
            let form_id = xobjects
                .get(b"Pg0")
                .and_then(Object::as_reference)
                .expect("form ref");
            let form = doc.get_object(form_id).and_then(Object::as_stream).expect("form");
            let content = form.decompressed_content().expect("decompress");
            let text = String::from_utf8_lossy(&content);
            let start = text.find('(').expect("label start") + 1;
            let end = text.find(')').expect("label end");
            text[start..end].to_string()
        })
        .collect()
}

#[test]
fn test_assemble_keeps_page_count_and_order() {
    let bytes = create_test_pdf(&[(612, 792), (400, 300), (612, 792)]);
    let writer = PageWriter::assemble(&vector_document(&bytes, 0.5)).expect("assemble");
    assert_eq!(writer.page_count(), 3);

    let out = writer.save_to_bytes().expect("save");
    let reloaded = Document::load_mem(&out).expect("output should be a valid PDF");
    assert_eq!(reloaded.get_pages().len(), 3);
    assert_eq!(page_labels(&reloaded), vec!["P1", "P2", "P3"]);
}

#[test]
fn test_vector_output_dimensions() {
    let bytes = create_test_pdf(&[(612, 792), (612, 792)]);
    let out = PageWriter::assemble(&vector_document(&bytes, 0.5))
        .expect("assemble")
        .save_to_bytes()
        .expect("save");

    let reader = PdfReader::from_bytes(&out, usize::MAX).expect("parse output");
    assert_eq!(reader.page_count(), 2);
    for page_num in 1..=2 {
        let (w, h) = reader.page_dimensions(page_num).expect("dimensions");
        assert!((w - 306.0).abs() < 1e-3, "width was {w}");
        assert!((h - 396.0).abs() < 1e-3, "height was {h}");
    }
}

/// The page content maps the original MediaBox onto the new one.
#[test]
fn test_vector_page_draws_form_with_scale_matrix() {
    let bytes = create_test_pdf(&[(612, 792)]);
    let writer = PageWriter::assemble(&vector_document(&bytes, 0.5)).expect("assemble");
    let doc = writer.document();

    let page_id = *doc.get_pages().get(&1).expect("page 1");
    let content = Content::decode(&doc.get_page_content(page_id).expect("content"))
        .expect("decode");
    let ops: Vec<&str> = content.operations.iter().map(|op| op.operator.as_str()).collect();
    assert_eq!(ops, vec!["q", "cm", "Do", "Q"]);

    let cm = &content.operations[1].operands;
    let values: Vec<f32> = cm.iter().map(|o| o.as_float().expect("number")).collect();
    assert_eq!(values, vec![0.5, 0.0, 0.0, 0.5, 0.0, 0.0]);
}

/// Fonts referenced by the original content survive; the outline does not.
#[test]
fn test_assemble_keeps_resources_and_drops_catalog_extras() {
    let bytes = create_test_pdf(&[(612, 792)]);
    let writer = PageWriter::assemble(&vector_document(&bytes, 0.5)).expect("assemble");
    let doc = writer.document();

    let catalog = doc.catalog().expect("catalog");
    assert!(catalog.get(b"Outlines").is_err(), "outlines should be dropped");

    let has_font = doc.objects.values().any(|obj| {
        obj.as_dict()
            .and_then(|d| d.get(b"BaseFont"))
            .and_then(Object::as_name)
            .is_ok_and(|name| name == b"Helvetica")
    });
    assert!(has_font, "font used by the page content should be kept");

    let has_outlines = doc.objects.values().any(|obj| {
        obj.as_dict()
            .and_then(|d| d.get(b"Type"))
            .and_then(Object::as_name)
            .is_ok_and(|name| name == b"Outlines")
    });
    assert!(!has_outlines, "unreferenced outline object should be pruned");
}

#[test]
fn test_assemble_carries_info_dictionary() {
    let bytes = create_test_pdf(&[(612, 792)]);
    let out = PageWriter::assemble(&vector_document(&bytes, 0.5))
        .expect("assemble")
        .save_to_bytes()
        .expect("save");

    let reloaded = Document::load_mem(&out).expect("reload");
    let info_id = reloaded
        .trailer
        .get(b"Info")
        .and_then(Object::as_reference)
        .expect("Info should be carried over");
    let info = reloaded.get_dictionary(info_id).expect("info dict");
    assert!(info.get(b"Title").is_ok());
}

#[test]
fn test_raster_page_embeds_full_page_image() {
    let bytes = create_test_pdf(&[(612, 792)]);
    let document = load(&bytes, usize::MAX).expect("load");
    let raster = RasterContent {
        width_px: 2,
        height_px: 2,
        data: zlib(&[0u8; 12]),
    };
    let flattened = document.with_pages(vec![Page {
        width: 612.0,
        height: 792.0,
        content: PageContent::Raster(raster),
    }]);

    let writer = PageWriter::assemble(&flattened).expect("assemble");
    let doc = writer.document();
    let page_id = *doc.get_pages().get(&1).expect("page");

    let reader_bytes = writer.save_to_bytes().expect("save");
    let reader = PdfReader::from_bytes(&reader_bytes, usize::MAX).expect("parse");
    assert_eq!(reader.page_dimensions(1).expect("dims"), (612.0, 792.0));

    let content = Content::decode(&doc.get_page_content(page_id).expect("content"))
        .expect("decode");
    let cm: Vec<f32> = content.operations[1]
        .operands
        .iter()
        .map(|o| o.as_float().expect("number"))
        .collect();
    assert_eq!(cm, vec![612.0, 0.0, 0.0, 792.0, 0.0, 0.0]);

    let image_count = doc
        .objects
        .values()
        .filter(|obj| {
            obj.as_stream()
                .and_then(|s| s.dict.get(b"Subtype"))
                .and_then(Object::as_name)
                .is_ok_and(|name| name == b"Image")
        })
        .count();
    assert_eq!(image_count, 1);
}

#[test]
fn test_assemble_empty_sequence_is_rejected() {
    let bytes = create_test_pdf(&[(612, 792)]);
    let empty = load(&bytes, usize::MAX).expect("load").with_pages(Vec::new());
    let result = PageWriter::assemble(&empty);
    assert!(matches!(result, Err(ResizeError::InvalidInput(_))));
}

/// Untransformed pages are copied through with their size.
#[test]
fn test_assemble_source_pages_round_trip() {
    let bytes = create_test_pdf(&[(300, 500), (612, 792)]);
    let document = load(&bytes, usize::MAX).expect("load");
    let out = PageWriter::assemble(&document)
        .expect("assemble")
        .save_to_bytes()
        .expect("save");

    let reader = PdfReader::from_bytes(&out, usize::MAX).expect("parse");
    assert_eq!(reader.page_dimensions(1).expect("p1"), (300.0, 500.0));
    assert_eq!(reader.page_dimensions(2).expect("p2"), (612.0, 792.0));
}

/// A copied page keeps its visible area.
#[test]
fn test_assemble_source_page_keeps_crop_box() {
    let mut source = Document::load_mem(&create_test_pdf(&[(612, 792)])).expect("load");
    let page_id = *source.get_pages().get(&1).expect("page 1");
    source
        .get_dictionary_mut(page_id)
        .expect("page dict")
        .set("CropBox", vec![0.into(), 0.into(), 306.into(), 792.into()]);
    let mut bytes = Vec::new();
    source.save_to(&mut bytes).expect("save");

    let out = PageWriter::assemble(&load(&bytes, usize::MAX).expect("load"))
        .expect("assemble")
        .save_to_bytes()
        .expect("save");

    let reader = PdfReader::from_bytes(&out, usize::MAX).expect("parse");
    assert_eq!(reader.media_box(1).expect("media box").width(), 612.0);
    assert_eq!(reader.page_dimensions(1).expect("dims"), (306.0, 792.0));
}
