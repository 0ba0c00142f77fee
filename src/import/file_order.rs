use regex::Regex;
use std::sync::OnceLock;

use super::ImportFile;

fn digits_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[0-9]+").expect("digit pattern is valid"))
}

/// 判断是否为纯文本文件（扩展名 .txt，不区分大小写）
pub fn is_text_file(name: &str) -> bool {
    name.to_lowercase().ends_with(".txt")
}

/// 提取文件名中的章节号
///
/// 取第一段连续数字；没有数字时为 0，超出 u64 时取 u64::MAX
pub fn chapter_number(name: &str) -> u64 {
    digits_pattern()
        .find(name)
        .map(|m| m.as_str().parse::<u64>().unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// 过滤出 .txt 文件并按章节号升序排列
///
/// 章节号相同的文件保持原有相对顺序
pub fn order_text_files(files: Vec<ImportFile>) -> Vec<ImportFile> {
    let mut txt_files: Vec<ImportFile> = files
        .into_iter()
        .filter(|f| is_text_file(&f.name))
        .collect();
    txt_files.sort_by_key(|f| chapter_number(&f.name));
    txt_files
}
