use encoding_rs::{Encoding, UTF_8};

use crate::error::{ReaderError, Result};

/// 按 UTF-8 解码文本文件
///
/// 有 BOM 时以 BOM 指示的编码为准；出现非法字节序列即视为失败，不做替换
pub fn decode_text(bytes: &[u8]) -> Result<String> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom_length)) => (encoding, &bytes[bom_length..]),
        None => (UTF_8, bytes),
    };

    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| text.into_owned())
        .ok_or_else(|| ReaderError::Decode(format!("内容不是有效的 {} 文本", encoding.name())))
}
