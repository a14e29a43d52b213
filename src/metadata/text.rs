//! Text kernel content handling: splitting data from comments, brute-force identifier
//! scanning, and metakernel file-list extraction.
//!
//! Fully parsing a text kernel is expensive. When the coverage oracle has already parsed
//! one, its keyword table is used; otherwise the data-section lines are scanned with
//! regular expressions for the identifier-bearing keywords, which is far cheaper.

use camino::Utf8Path;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::IdSet;
use crate::oracle::{KeywordTable, TkValue};
use crate::spicerack_errors::Result;

static BODY_FRAME_INS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:FRAME|BODY|INS)_?(-?\d+)_").expect("static pattern"));
static SCLK_DATA_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*SCLK_DATA_TYPE_(\d+)").expect("static pattern"));
static KEY_BODY_FRAME_INS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:FRAME|BODY|INS)_?(-?\d+)_").expect("static pattern"));
static KEY_SCLK_DATA_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^SCLK_DATA_TYPE_(\d+)").expect("static pattern"));
static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"'([^']+)'").expect("static pattern"));

/// Read a kernel file as lines of text. Kernel files are latin-1 encoded in the wild, so
/// the bytes are decoded lossily rather than strictly.
pub fn read_lines(path: &Utf8Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.lines().map(|line| line.to_string()).collect())
}

/// Split text kernel lines into `(data, comments)` around the `\begindata` /
/// `\begintext` markers. Everything before the first `\begindata` is comment.
pub fn split_text(lines: &[String]) -> (Vec<String>, Vec<String>) {
    let mut content = Vec::new();
    let mut comments = Vec::new();
    let mut is_comment = true;

    for line in lines {
        let lower = line.to_lowercase();
        if lower.contains(r"\begindata") {
            is_comment = false;
        } else if lower.contains(r"\begintext") {
            is_comment = true;
            comments.push(line.clone());
        } else if is_comment {
            comments.push(line.clone());
        } else {
            content.push(line.clone());
        }
    }

    (content, comments)
}

/// Brute-force scan of data-section lines for NAIF IDs, looking for
/// `BODY…`/`FRAME…`/`INS…` keyword assignments and `SCLK_DATA_TYPE_n` clock entries
/// (which imply the negated clock ID).
pub fn ids_from_content(content: &[String]) -> IdSet {
    let mut ids = IdSet::new();
    for line in content {
        if let Some(caps) = BODY_FRAME_INS.captures(line) {
            if let Ok(id) = caps[1].parse::<i32>() {
                ids.insert(id);
            }
        }
        if let Some(caps) = SCLK_DATA_TYPE.captures(line) {
            if let Ok(id) = caps[1].parse::<i32>() {
                ids.insert(-id);
            }
        }
    }
    ids
}

/// Extract NAIF IDs from an already-parsed keyword table.
pub fn ids_from_table(table: &KeywordTable) -> IdSet {
    let mut ids = IdSet::new();
    for (key, value) in table {
        if let Some(caps) = KEY_BODY_FRAME_INS.captures(key) {
            if let Ok(id) = caps[1].parse::<i32>() {
                ids.insert(id);
            }
        }
        if let Some(caps) = KEY_SCLK_DATA_TYPE.captures(key) {
            if let Ok(id) = caps[1].parse::<i32>() {
                ids.insert(-id);
            }
        }
        if key.eq_ignore_ascii_case("NAIF_BODY_CODE") {
            match value {
                TkValue::Integer(id) => {
                    ids.insert(*id as i32);
                }
                TkValue::IntArray(codes) => {
                    ids.extend(codes.iter().map(|&id| id as i32));
                }
                _ => {}
            }
        }
    }
    ids
}

/// The basenames listed in a metakernel's `KERNELS_TO_LOAD` assignment, in order.
pub fn meta_basenames(content: &[String]) -> Vec<String> {
    let mut basenames = Vec::new();
    let mut in_list = false;

    for line in content {
        let upper = line.to_uppercase();
        if upper.contains("KERNELS_TO_LOAD") {
            in_list = true;
        }
        if !in_list {
            continue;
        }

        for caps in QUOTED.captures_iter(line) {
            let path = &caps[1];
            let basename = path.rsplit(['/', '\\']).next().unwrap_or(path);
            basenames.push(basename.to_string());
        }

        // The list ends at the closing parenthesis outside any quote
        if QUOTED.replace_all(line, "").contains(')') {
            in_list = false;
        }
    }

    basenames
}

/// True if this content belongs to a metakernel.
pub fn is_metakernel(lines: &[String]) -> bool {
    lines
        .iter()
        .any(|line| line.to_uppercase().contains("KERNELS_TO_LOAD"))
}

#[cfg(test)]
mod text_test {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|l| l.to_string()).collect()
    }

    #[test]
    fn data_and_comment_split() {
        let all = lines(
            "Leading comment\n\\begindata\nBODY399_RADII = ( 6378.1 )\n\\begintext\nTrailing comment\n",
        );
        let (content, comments) = split_text(&all);
        assert_eq!(content, vec!["BODY399_RADII = ( 6378.1 )"]);
        assert_eq!(comments.len(), 3);
    }

    #[test]
    fn id_scanning() {
        let content = lines(
            "BODY399_RADII = ( 6378.1 )\n  FRAME_-82905_NAME = 'CASSINI_KSMB'\nINS-82345_FOV = 1\nSCLK_DATA_TYPE_82 = ( 1 )\n",
        );
        let ids = ids_from_content(&content);
        assert_eq!(ids, IdSet::from([399, -82905, -82345, -82]));
    }

    #[test]
    fn table_id_extraction() {
        let mut table = KeywordTable::new();
        table.insert("BODY610_GM".to_string(), TkValue::Real(8978.0));
        table.insert(
            "NAIF_BODY_CODE".to_string(),
            TkValue::IntArray(vec![644, 645]),
        );
        table.insert("SCLK_DATA_TYPE_32".to_string(), TkValue::Integer(1));

        let ids = ids_from_table(&table);
        assert_eq!(ids, IdSet::from([610, 644, 645, -32]));
    }

    #[test]
    fn metakernel_file_list() {
        let content = lines(
            "KERNELS_TO_LOAD = (\n    '$KERNELS/lsk/naif0012.tls'\n    '$KERNELS/spk/sat337.bsp'\n)\nOTHER = 1\n",
        );
        assert!(is_metakernel(&content));
        assert_eq!(meta_basenames(&content), vec!["naif0012.tls", "sat337.bsp"]);
    }
}
