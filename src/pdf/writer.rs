// 変換済みページ列から出力PDFを組み立てる

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

use crate::error::ResizeError;
use crate::pdf::page::{self, FormContent, Page, PageContent, RasterContent, SourcePage};

/// ページ内でXObjectを参照するリソース名。
const XOBJECT_NAME: &str = "Pg0";

/// 変換済みページからPDFページツリーを構築する。
///
/// 入力文書のオブジェクトを引き継ぐため、ベクター再描画したページは
/// 元のフォントや画像をそのまま参照できる。未参照のオブジェクトは
/// [`PageWriter::finish`] で除去される。
pub struct PageWriter {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl PageWriter {
    /// 入力文書のオブジェクトストアを引き継いだ空のページツリーを作成する。
    pub fn from_store(store: &Document) -> Self {
        let mut doc = Document::with_version(store.version.clone());
        doc.objects = store.objects.clone();
        doc.max_id = store.max_id;

        // Infoのみ引き継ぎ、Catalog側（Outlines、AcroForm等）は破棄する
        if let Ok(info) = store.trailer.get(b"Info") {
            doc.trailer.set("Info", info.clone());
        }

        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    /// ページ列を入力順に書き込み、完成したPageWriterを返す。
    pub fn assemble(document: &page::Document) -> crate::error::Result<Self> {
        if document.pages().is_empty() {
            return Err(ResizeError::invalid_input("cannot assemble an empty page sequence"));
        }

        let mut writer = Self::from_store(document.store());
        for page in document.pages() {
            writer.write_page(page)?;
        }
        writer.finish();

        tracing::debug!(pages = writer.page_count(), "document assembled");
        Ok(writer)
    }

    /// 画像XObjectを追加する（FlateDecode済みRGB）。
    ///
    /// 戻り値はXObjectのオブジェクトID。
    pub fn add_image_xobject(&mut self, raster: &RasterContent) -> ObjectId {
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => raster.width_px as i64,
            "Height" => raster.height_px as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };
        let stream = Stream::new(dict, raster.data.clone());
        self.doc.add_object(Object::Stream(stream))
    }

    /// 元ページのコンテンツをForm XObjectとして追加する。
    ///
    /// 戻り値はXObjectのオブジェクトID。
    pub fn add_form_xobject(&mut self, form: &FormContent) -> ObjectId {
        let resources = form
            .resources
            .clone()
            .unwrap_or_else(|| Object::Dictionary(Dictionary::new()));
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "FormType" => 1,
            "BBox" => form.bbox.to_object(),
            "Resources" => resources,
        };
        let stream = Stream::new(dict, form.content.clone());
        self.doc.add_object(Object::Stream(stream))
    }

    /// XObjectを変換行列付きで描画するコンテンツストリームを生成する。
    ///
    /// `q a b c d e f cm /<name> Do Q`
    pub fn build_draw_content_stream(
        name: &str,
        matrix: [f64; 6],
    ) -> crate::error::Result<Vec<u8>> {
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    matrix.iter().map(|&v| Object::Real(v as f32)).collect(),
                ),
                Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        content
            .encode()
            .map_err(|e| ResizeError::resource(format!("failed to encode content stream: {e}")))
    }

    /// 1ページを書き込み、ページのオブジェクトIDを返す。
    pub fn write_page(&mut self, page: &Page) -> crate::error::Result<ObjectId> {
        let page_id = match &page.content {
            PageContent::Form(form) => {
                let xobject_id = self.add_form_xobject(form);
                // 元ページ表示領域の原点を新ページの原点に合わせる
                let matrix = [
                    form.scale,
                    0.0,
                    0.0,
                    form.scale,
                    -form.bbox.x0 * form.scale,
                    -form.bbox.y0 * form.scale,
                ];
                let content = Self::build_draw_content_stream(XOBJECT_NAME, matrix)?;
                self.add_page(page, xobject_id, content, form.rotation)
            }
            PageContent::Raster(raster) => {
                let xobject_id = self.add_image_xobject(raster);
                let matrix = [page.width, 0.0, 0.0, page.height, 0.0, 0.0];
                let content = Self::build_draw_content_stream(XOBJECT_NAME, matrix)?;
                self.add_page(page, xobject_id, content, 0)
            }
            PageContent::Source(src) => self.copy_source_page(page, src)?,
        };

        self.kids.push(page_id);
        Ok(page_id)
    }

    /// XObjectを1つだけ描画するページを作成する。
    fn add_page(
        &mut self,
        page: &Page,
        xobject_id: ObjectId,
        content: Vec<u8>,
        rotation: i64,
    ) -> ObjectId {
        let mut xobject_dict = Dictionary::new();
        xobject_dict.set(XOBJECT_NAME, Object::Reference(xobject_id));

        let content_id = self
            .doc
            .add_object(Object::Stream(Stream::new(dictionary! {}, content)));

        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page.width as f32),
                Object::Real(page.height as f32),
            ],
            "Resources" => dictionary! {
                "XObject" => Object::Dictionary(xobject_dict),
            },
            "Contents" => content_id,
        };
        if rotation != 0 {
            page_dict.set("Rotate", rotation);
        }

        self.doc.add_object(page_dict)
    }

    /// 未変換のページを継承属性を明示した上でそのまま複製する（注釈は破棄）。
    fn copy_source_page(
        &mut self,
        page: &Page,
        src: &SourcePage,
    ) -> crate::error::Result<ObjectId> {
        let mut page_dict = self.doc.get_dictionary(src.object_id)?.clone();
        page_dict.set("Parent", self.pages_id);
        page_dict.set("MediaBox", src.media_box.to_object());
        if src.crop_box == src.media_box {
            page_dict.remove(b"CropBox");
        } else {
            page_dict.set("CropBox", src.crop_box.to_object());
        }
        page_dict.remove(b"Annots");
        if let Some(resources) = &src.resources {
            page_dict.set("Resources", resources.clone());
        }
        if src.rotation != 0 {
            page_dict.set("Rotate", src.rotation);
        }

        tracing::trace!(page = src.number, width = page.width, "source page copied");
        Ok(self.doc.add_object(page_dict))
    }

    /// Pagesノード、Catalogを作成し、最適化を実行する。
    pub fn finish(&mut self) {
        let kids: Vec<Object> = self.kids.iter().map(|&id| id.into()).collect();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => self.kids.len() as i64,
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        crate::pdf::optimizer::optimize(&mut self.doc);
    }

    /// 書き込み済みページ数を返す。
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// 組み立て中のlopdf Documentへの参照を返す。
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// PDFドキュメントをバイト列として出力する。
    pub fn save_to_bytes(&self) -> crate::error::Result<Vec<u8>> {
        let mut buf = Vec::new();
        // clone to avoid borrowing issues with save_to (takes &mut self in lopdf)
        self.doc
            .clone()
            .save_to(&mut buf)
            .map_err(|e| ResizeError::resource(format!("failed to serialize PDF: {e}")))?;
        Ok(buf)
    }
}
