use lopdf::{Document, Object};

use crate::error::ResizeError;
use crate::pdf::page::{self, Page, PageContent, Rect, SourcePage};

/// Parent連鎖をたどる最大深さ（循環参照対策）。
const MAX_INHERITANCE_DEPTH: usize = 64;

/// ヘッダー `%PDF-` を探す先頭範囲（バイト数）。
const HEADER_SEARCH_WINDOW: usize = 1024;

pub struct PdfReader {
    doc: Document,
}

impl PdfReader {
    /// バイト列からPDFを読み込んでPdfReaderを作成する。
    ///
    /// 空入力、サイズ上限超過、`%PDF-` ヘッダーなし、構造破損はすべて
    /// `ParseFailure` になる。
    pub fn from_bytes(bytes: &[u8], max_input_bytes: usize) -> crate::error::Result<Self> {
        if bytes.is_empty() {
            return Err(ResizeError::parse("input is empty"));
        }
        if bytes.len() > max_input_bytes {
            return Err(ResizeError::parse(format!(
                "input is {} bytes, limit is {} bytes",
                bytes.len(),
                max_input_bytes
            )));
        }

        let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
        if !window.windows(5).any(|w| w == b"%PDF-") {
            return Err(ResizeError::parse("missing %PDF- header"));
        }

        // lopdfは壊れたxrefテーブルでpanicすることがあるため、ここで受け止める
        let doc = std::panic::catch_unwind(|| Document::load_mem(bytes))
            .map_err(|_| ResizeError::parse("PDF structure is malformed"))??;

        Ok(Self { doc })
    }

    /// ページ数を返す。
    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// ページ辞書から継承可能なエントリを取得する（Parent経由の継承も考慮）。
    fn get_inherited(
        &self,
        dict: &lopdf::Dictionary,
        key: &[u8],
    ) -> crate::error::Result<Option<Object>> {
        let mut current = dict;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            // まず現在の辞書から探す
            if let Ok(obj) = current.get(key) {
                return Ok(Some(obj.clone()));
            }

            // 見つからなければParentをたどる
            match current.get(b"Parent") {
                Ok(Object::Reference(parent_id)) => {
                    current = self.doc.get_dictionary(*parent_id)?;
                }
                _ => return Ok(None),
            }
        }

        Err(ResizeError::parse("page tree Parent chain is too deep"))
    }

    /// 間接参照なら参照先オブジェクトを返す。
    fn resolve<'a>(&'a self, obj: &'a Object) -> crate::error::Result<&'a Object> {
        match obj {
            Object::Reference(id) => Ok(self.doc.get_object(*id)?),
            other => Ok(other),
        }
    }

    /// 指定ページ(1-indexed)の矩形エントリ（MediaBox、CropBox等）を継承込みで読む。
    fn page_box(&self, page_num: u32, key: &[u8]) -> crate::error::Result<Option<Rect>> {
        let name = String::from_utf8_lossy(key);
        let page_id = self.get_page_id(page_num)?;
        let page_dict = self.doc.get_dictionary(page_id)?;

        let Some(entry) = self.get_inherited(page_dict, key)? else {
            return Ok(None);
        };
        let array = self.resolve(&entry)?.as_array()?;
        if array.len() < 4 {
            return Err(ResizeError::parse(format!("page {page_num}: invalid {name}")));
        }

        // 値は整数または実数の可能性がある
        let to_f64 = |obj: &Object| -> crate::error::Result<f64> {
            match self.resolve(obj)? {
                Object::Integer(i) => Ok(*i as f64),
                Object::Real(f) => Ok(*f as f64),
                _ => Err(ResizeError::parse(format!(
                    "page {page_num}: invalid {name} value"
                ))),
            }
        };

        Ok(Some(Rect::from_corners(
            to_f64(&array[0])?,
            to_f64(&array[1])?,
            to_f64(&array[2])?,
            to_f64(&array[3])?,
        )))
    }

    /// 指定ページ(1-indexed)のMediaBoxを返す。
    pub fn media_box(&self, page_num: u32) -> crate::error::Result<Rect> {
        let rect = self
            .page_box(page_num, b"MediaBox")?
            .ok_or_else(|| ResizeError::parse(format!("page {page_num}: MediaBox not found")))?;

        if !(rect.width() > 0.0 && rect.height() > 0.0) {
            return Err(ResizeError::parse(format!(
                "page {page_num}: non-positive page dimensions"
            )));
        }

        Ok(rect)
    }

    /// 指定ページ(1-indexed)の表示領域（CropBoxとMediaBoxの共通部分）を返す。
    ///
    /// CropBoxがない、または共通部分が空の場合はMediaBoxを返す。
    pub fn crop_box(&self, page_num: u32) -> crate::error::Result<Rect> {
        let media_box = self.media_box(page_num)?;
        let Some(crop) = self.page_box(page_num, b"CropBox")? else {
            return Ok(media_box);
        };

        match crop.intersect(&media_box) {
            Some(visible) => Ok(visible),
            None => {
                tracing::warn!(page = page_num, "CropBox lies outside MediaBox, using MediaBox");
                Ok(media_box)
            }
        }
    }

    /// 指定ページ(1-indexed)の表示領域からページ寸法(width_pts, height_pts)を返す。
    pub fn page_dimensions(&self, page_num: u32) -> crate::error::Result<(f64, f64)> {
        let rect = self.crop_box(page_num)?;
        Ok((rect.width(), rect.height()))
    }

    /// 指定ページ(1-indexed)の回転角（0, 90, 180, 270）を返す。
    ///
    /// 90の倍数でない値は0として扱う。
    pub fn page_rotation(&self, page_num: u32) -> crate::error::Result<i64> {
        let page_id = self.get_page_id(page_num)?;
        let page_dict = self.doc.get_dictionary(page_id)?;

        let rotation = match self.get_inherited(page_dict, b"Rotate")? {
            Some(obj) => match self.resolve(&obj)? {
                Object::Integer(deg) => deg.rem_euclid(360),
                _ => 0,
            },
            None => 0,
        };

        Ok(if rotation % 90 == 0 { rotation } else { 0 })
    }

    /// 指定ページ(1-indexed)のResourcesを返す（インライン辞書または参照のまま）。
    pub fn page_resources(&self, page_num: u32) -> crate::error::Result<Option<Object>> {
        let page_id = self.get_page_id(page_num)?;
        let page_dict = self.doc.get_dictionary(page_id)?;
        self.get_inherited(page_dict, b"Resources")
    }

    /// ページ列を組み立てて文書モデルに変換する。
    pub fn into_document(self, source: Vec<u8>) -> crate::error::Result<page::Document> {
        let page_ids = self.doc.get_pages();
        if page_ids.is_empty() {
            return Err(ResizeError::parse("document has no pages"));
        }

        let mut pages = Vec::with_capacity(page_ids.len());
        for (&number, &object_id) in &page_ids {
            let media_box = self.media_box(number)?;
            let crop_box = self.crop_box(number)?;
            let source_page = SourcePage {
                number,
                object_id,
                media_box,
                crop_box,
                rotation: self.page_rotation(number)?,
                resources: self.page_resources(number)?,
            };
            pages.push(Page {
                width: crop_box.width(),
                height: crop_box.height(),
                content: PageContent::Source(source_page),
            });
        }

        Ok(page::Document::new(self.doc, source, pages))
    }

    /// ページ番号(1-indexed)からObjectIdを取得する。
    fn get_page_id(&self, page_num: u32) -> crate::error::Result<lopdf::ObjectId> {
        let pages = self.doc.get_pages();
        pages
            .get(&page_num)
            .copied()
            .ok_or_else(|| ResizeError::parse(format!("page {} not found", page_num)))
    }
}

/// バイト列を読み込み、ページ列を持つ文書モデルを返す。
pub fn load(bytes: &[u8], max_input_bytes: usize) -> crate::error::Result<page::Document> {
    let reader = PdfReader::from_bytes(bytes, max_input_bytes)?;
    let document = reader.into_document(bytes.to_vec())?;
    tracing::debug!(pages = document.page_count(), bytes = bytes.len(), "document loaded");
    Ok(document)
}
