//! Parser for ratings files.
//!
//! Two layouts are accepted, one per line:
//! - CSV export:   `userId,itemId,rating[,timestamp]`
//! - MovieLens .dat: `userId::itemId::rating[::timestamp]`
//!
//! A header line (first field not numeric) is skipped, trailing columns are
//! ignored and an empty rating field means the pair was never rated.

use crate::error::{DataLoadError, Result};
use crate::types::*;
use std::fs;
use std::path::Path;

/// Parse a whole ratings file into records.
pub fn parse_ratings(path: &Path) -> Result<Vec<Rating>> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(e),
    })?;
    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut ratings = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        if idx == 0 && is_header(line) {
            continue;
        }
        if let Some(rating) = parse_rating_line(line, &file, line_no)? {
            ratings.push(rating);
        }
    }
    Ok(ratings)
}

/// Parse a single line.
///
/// Returns `Ok(None)` for blank lines and for lines whose rating is unset.
pub fn parse_rating_line(line: &str, file: &str, line_no: usize) -> Result<Option<Rating>> {
    let line_trimmed = line.trim();
    if line_trimmed.is_empty() {
        return Ok(None);
    }

    let mut parts = split_fields(line_trimmed);
    let parse_error = |reason: String| DataLoadError::ParseError {
        file: file.to_string(),
        line: line_no,
        reason,
    };

    let user_id = parts
        .next()
        .ok_or_else(|| parse_error("Missing userId".to_string()))?;
    let item_id = parts
        .next()
        .ok_or_else(|| parse_error("Missing itemId".to_string()))?;
    let rating_value = parts
        .next()
        .ok_or_else(|| parse_error("Missing rating".to_string()))?;

    if rating_value.is_empty() {
        return Ok(None);
    }

    let rating = Rating {
        user_id: user_id
            .parse()
            .map_err(|e| parse_error(format!("Invalid userId: {}", e)))?,
        item_id: item_id
            .parse()
            .map_err(|e| parse_error(format!("Invalid itemId: {}", e)))?,
        rating: rating_value
            .parse()
            .map_err(|e| parse_error(format!("Invalid rating: {}", e)))?,
    };
    Ok(Some(rating))
}

fn split_fields(line: &str) -> Box<dyn Iterator<Item = &str> + '_> {
    if line.contains("::") {
        Box::new(line.split("::").map(str::trim))
    } else {
        Box::new(line.split(',').map(str::trim))
    }
}

fn is_header(line: &str) -> bool {
    split_fields(line.trim())
        .next()
        .is_some_and(|first| !first.is_empty() && first.parse::<u64>().is_err())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_csv_line() {
        let rating = parse_rating_line("1,31,2.5,1260759144", "ratings.csv", 2)
            .unwrap()
            .unwrap();
        assert_eq!(rating, Rating::new(1, 31, 2.5));
    }

    #[test]
    fn test_parse_dat_line() {
        let rating = parse_rating_line("1::1193::5::978300760", "ratings.dat", 1)
            .unwrap()
            .unwrap();
        assert_eq!(rating, Rating::new(1, 1193, 5.0));
    }

    #[test]
    fn test_unset_rating_is_skipped() {
        assert!(parse_rating_line("3,7,,", "ratings.csv", 4).unwrap().is_none());
        assert!(parse_rating_line("   ", "ratings.csv", 5).unwrap().is_none());
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = parse_rating_line("1,abc,4", "ratings.csv", 9).unwrap_err();
        match err {
            DataLoadError::ParseError { file, line, reason } => {
                assert_eq!(file, "ratings.csv");
                assert_eq!(line, 9);
                assert!(reason.contains("itemId"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_field() {
        let err = parse_rating_line("1,2", "ratings.csv", 3).unwrap_err();
        assert!(err.to_string().contains("Missing rating"));
    }

    #[test]
    fn test_parse_file_skips_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "userId,movieId,rating,timestamp").unwrap();
        writeln!(file, "1,10,4.0,100").unwrap();
        writeln!(file, "2,10,3.0,101").unwrap();
        writeln!(file).unwrap();

        let ratings = parse_ratings(file.path()).unwrap();
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[1], Rating::new(2, 10, 3.0));
    }

    #[test]
    fn test_missing_file() {
        let err = parse_ratings(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, DataLoadError::FileNotFound { .. }));
    }
}
