// ABOUTME: Query generator turning administrative-unit tuples into deduplicated search strings.
// ABOUTME: Region CSV files are decoded by BOM or detected charset before parsing.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use tracing::{debug, info};

use crate::error::ConfigError;

pub const DEFAULT_SUFFIX: &str = "가볼만한곳";

/// Number of leading administrative units that form a query.
pub const QUERY_UNITS: usize = 3;

/// Joins the first three non-empty components and appends the suffix.
pub fn build_query<S: AsRef<str>>(parts: &[S], suffix: &str) -> Option<String> {
    let units: Vec<&str> = parts
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .take(QUERY_UNITS)
        .collect();
    if units.is_empty() {
        return None;
    }
    let suffix = suffix.trim();
    if suffix.is_empty() {
        Some(units.join(" "))
    } else {
        Some(format!("{} {}", units.join(" "), suffix))
    }
}

/// Builds queries for every row, keeping the first occurrence of each.
pub fn generate_queries<S: AsRef<str>>(rows: &[Vec<S>], suffix: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| build_query(row.as_slice(), suffix))
        .filter(|q| seen.insert(q.clone()))
        .collect()
}

/// Decodes bytes using a BOM if present, otherwise the detected charset.
pub fn decode_bytes(bytes: &[u8]) -> (Cow<'_, str>, &'static Encoding) {
    if let Some((enc, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = enc.decode_without_bom_handling(&bytes[bom_len..]);
        return (text, enc);
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(None, true);
    let (text, _) = enc.decode_without_bom_handling(bytes);
    (text, enc)
}

/// Reads region rows from a CSV file with a header row.
pub fn load_region_rows(path: &Path) -> Result<Vec<Vec<String>>, ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let (text, enc) = decode_bytes(&bytes);
    debug!(path = %path.display(), encoding = enc.name(), "decoded region file");

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ConfigError::Regions {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Loads and generates the query list for a region CSV file.
pub fn load_queries(path: &Path, suffix: &str) -> Result<Vec<String>, ConfigError> {
    let rows = load_region_rows(path)?;
    let queries = generate_queries(&rows, suffix);
    info!(path = %path.display(), rows = rows.len(), queries = queries.len(), "generated queries");
    Ok(queries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn takes_first_three_non_empty_units() {
        assert_eq!(
            build_query(&["서울특별시", " ", "중구", "명동", "extra"], DEFAULT_SUFFIX).as_deref(),
            Some("서울특별시 중구 명동 가볼만한곳")
        );
        assert_eq!(
            build_query(&["제주특별자치도", "", ""], DEFAULT_SUFFIX).as_deref(),
            Some("제주특별자치도 가볼만한곳")
        );
        assert_eq!(build_query(&["", " "], DEFAULT_SUFFIX), None);
    }

    #[test]
    fn dedupes_in_input_order() {
        let rows = vec![
            vec!["서울", "중구", ""],
            vec!["서울", "종로구", ""],
            vec!["서울", "중구", " "],
            vec!["", "", ""],
        ];
        assert_eq!(
            generate_queries(&rows, DEFAULT_SUFFIX),
            vec!["서울 중구 가볼만한곳", "서울 종로구 가볼만한곳"]
        );
    }

    #[test]
    fn decodes_utf8_bom_and_euc_kr() {
        let (text, enc) = decode_bytes("\u{feff}시도,시군구\n서울,중구\n".as_bytes());
        assert_eq!(enc, encoding_rs::UTF_8);
        assert!(text.starts_with("시도"));

        let source = "시도명,시군구명,읍면동명\n서울특별시,중구,명동\n서울특별시,종로구,청운효자동\n\
                      부산광역시,해운대구,우동\n경기도,수원시,장안구\n강원특별자치도,춘천시,효자동\n";
        let (bytes, _, _) = encoding_rs::EUC_KR.encode(source);
        let (text, enc) = decode_bytes(&bytes);
        assert_eq!(enc, encoding_rs::EUC_KR);
        assert_eq!(text, source);
    }

    #[test]
    fn loads_queries_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.csv");
        fs::write(&path, "시도,시군구,읍면동,리\n서울특별시,중구,,\n서울특별시,중구,,\n부산광역시,해운대구,우동,\n").unwrap();
        let queries = load_queries(&path, DEFAULT_SUFFIX).unwrap();
        assert_eq!(
            queries,
            vec!["서울특별시 중구 가볼만한곳", "부산광역시 해운대구 우동 가볼만한곳"]
        );
    }
}
