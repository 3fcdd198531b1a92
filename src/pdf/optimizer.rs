// 出力PDFの後処理: FlateDecode圧縮、孤立オブジェクト除去

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::{Document, Object, ObjectId};

/// ストリームを圧縮対象にするか判定する。
///
/// 既にフィルターが設定されているもの（二重圧縮防止）とXMPメタデータは対象外。
fn should_compress(stream: &lopdf::Stream) -> bool {
    if !stream.allows_compression || stream.dict.get(b"Filter").is_ok() {
        return false;
    }
    !matches!(
        stream.dict.get(b"Type").and_then(Object::as_name),
        Ok(b"Metadata")
    )
}

/// ドキュメント内の未圧縮ストリームにFlateDecode圧縮を適用する。
pub fn compress_streams(doc: &mut Document) {
    let ids: Vec<ObjectId> = doc.objects.keys().copied().collect();

    for id in ids {
        let Some(Object::Stream(stream)) = doc.objects.get_mut(&id) else {
            continue;
        };
        if !should_compress(stream) {
            continue;
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        if encoder.write_all(&stream.content).is_err() {
            continue;
        }
        let Ok(compressed) = encoder.finish() else {
            continue;
        };

        stream.dict.set("Filter", "FlateDecode");
        stream.set_content(compressed);
    }
}

/// 新しいCatalogから到達できないオブジェクト（旧ページツリー等）を除去する。
pub fn delete_unused_objects(doc: &mut Document) -> usize {
    doc.prune_objects().len()
}

/// 最適化の全パスを順序通りに実行する。
///
/// 1. 孤立オブジェクトを除去
/// 2. 未圧縮ストリームを圧縮
pub fn optimize(doc: &mut Document) {
    let pruned = delete_unused_objects(doc);
    compress_streams(doc);
    tracing::debug!(pruned, objects = doc.objects.len(), "output optimized");
}
