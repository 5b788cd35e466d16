//! Parser and writer for delimited rating files.
//!
//! Supported layouts (a trailing timestamp or extra columns are ignored):
//! - `dat`: userId::itemId::rating[::timestamp] (MovieLens 1M/10M style)
//! - `csv`: userId,itemId,rating[,timestamp] with an optional header line
//! - `tsv`: userId<TAB>itemId<TAB>rating[<TAB>timestamp] (MovieLens 100k style)
//!
//! Lines are parsed in parallel with Rayon.

use crate::error::{DataLoadError, Result};
use crate::types::Rating;
use rayon::prelude::*;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Field layout of a ratings file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RatingFormat {
    #[default]
    Dat,
    Csv,
    Tsv,
}

impl RatingFormat {
    pub fn delimiter(&self) -> &'static str {
        match self {
            RatingFormat::Dat => "::",
            RatingFormat::Csv => ",",
            RatingFormat::Tsv => "\t",
        }
    }

    /// Guess the format from a file extension, defaulting to `dat`
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("csv") => RatingFormat::Csv,
            Some("tsv") | Some("data") => RatingFormat::Tsv,
            _ => RatingFormat::Dat,
        }
    }
}

impl FromStr for RatingFormat {
    type Err = DataLoadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dat" => Ok(RatingFormat::Dat),
            "csv" => Ok(RatingFormat::Csv),
            "tsv" => Ok(RatingFormat::Tsv),
            _ => Err(DataLoadError::InvalidValue {
                field: "format".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for RatingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RatingFormat::Dat => "dat",
            RatingFormat::Csv => "csv",
            RatingFormat::Tsv => "tsv",
        };
        f.write_str(name)
    }
}

/// Helper function to read a file with ISO-8859-1 encoding (Latin-1)
///
/// The MovieLens dataset uses ISO-8859-1 encoding, not UTF-8.
/// Each byte maps directly to a Unicode code point, so the conversion never fails.
fn read_lines_latin1(path: &Path) -> Result<Vec<String>> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let content: String = bytes.iter().map(|&b| b as char).collect();

    Ok(content.lines().map(|s| s.to_string()).collect())
}

/// Parse a ratings file
pub fn parse_ratings(path: &Path, format: RatingFormat) -> Result<Vec<Rating>> {
    let lines = read_lines_latin1(path)?;
    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let ratings = parse_lines(&lines, format, &file)?;
    debug!(file = %file, %format, count = ratings.len(), "parsed ratings");
    Ok(ratings)
}

/// Parse already-read lines; `file` is only used for error messages
pub fn parse_lines(lines: &[String], format: RatingFormat, file: &str) -> Result<Vec<Rating>> {
    let header = (format != RatingFormat::Dat && looks_like_header(lines, format))
        .then(|| first_content_line(lines));

    let parsed: Vec<Option<Rating>> = lines
        .par_iter()
        .enumerate()
        .map(|(idx, line)| {
            let line_no = idx + 1;
            let line_trimmed = line.trim();
            if line_trimmed.is_empty() || header == Some(idx) {
                return Ok(None);
            }
            parse_rating_line(line_trimmed, format, file, line_no).map(Some)
        })
        .collect::<Result<_>>()?;

    Ok(parsed.into_iter().flatten().collect())
}

fn first_content_line(lines: &[String]) -> usize {
    lines
        .iter()
        .position(|line| !line.trim().is_empty())
        .unwrap_or(0)
}

/// A header is a first line whose user, item and rating fields are all
/// non-numeric; a first row with only some bad fields is a parse error.
fn looks_like_header(lines: &[String], format: RatingFormat) -> bool {
    let Some(line) = lines.iter().map(|line| line.trim()).find(|line| !line.is_empty()) else {
        return false;
    };
    let fields: Vec<&str> = line.split(format.delimiter()).map(str::trim).take(3).collect();
    fields.len() == 3 && fields.iter().all(|field| field.parse::<f64>().is_err())
}

fn parse_rating_line(line: &str, format: RatingFormat, file: &str, line_no: usize) -> Result<Rating> {
    let parts: Vec<&str> = line.split(format.delimiter()).map(str::trim).collect();
    if parts.len() < 3 {
        return Err(DataLoadError::FieldCountMismatch {
            expected: 3,
            found: parts.len(),
            line: line_no,
        });
    }

    let parse_error = |what: &str, e: &dyn fmt::Display| DataLoadError::ParseError {
        file: file.to_string(),
        line: line_no,
        reason: format!("Invalid {}: {}", what, e),
    };

    let user_id = parts[0].parse().map_err(|e| parse_error("userId", &e))?;
    let item_id = parts[1].parse().map_err(|e| parse_error("itemId", &e))?;
    let value: f64 = parts[2].parse().map_err(|e| parse_error("rating", &e))?;

    if !value.is_finite() {
        return Err(parse_error("rating", &"value is not finite"));
    }

    Ok(Rating::new(user_id, item_id, value))
}

/// Write ratings in the given layout (no header, no timestamp column)
pub fn write_ratings(path: &Path, ratings: &[Rating], format: RatingFormat) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let delimiter = format.delimiter();
    for rating in ratings {
        writeln!(
            writer,
            "{}{d}{}{d}{}",
            rating.user_id,
            rating.item_id,
            rating.value,
            d = delimiter
        )?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_dat_lines() {
        let input = lines("1::1193::5::978300760\n1::661::3::978302109\n\n2::3068::4::978299000");
        let ratings = parse_lines(&input, RatingFormat::Dat, "ratings.dat").unwrap();

        assert_eq!(ratings.len(), 3);
        assert_eq!(ratings[0], Rating::new(1, 1193, 5.0));
        assert_eq!(ratings[2].user_id, 2);
    }

    #[test]
    fn test_parse_csv_with_header() {
        let input = lines("userId,movieId,rating,timestamp\n1,31,2.5,1260759144\n1,1029,3.0,1260759179");
        let ratings = parse_lines(&input, RatingFormat::Csv, "ratings.csv").unwrap();

        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0], Rating::new(1, 31, 2.5));
    }

    #[test]
    fn test_malformed_first_row_is_not_a_header() {
        let input = lines("x1,10,4\n2,20,3");
        let err = parse_lines(&input, RatingFormat::Csv, "ratings.csv").unwrap_err();
        match err {
            DataLoadError::ParseError { line, reason, .. } => {
                assert_eq!(line, 1);
                assert!(reason.contains("userId"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_tsv_without_timestamp() {
        let input = lines("196\t242\t3\n186\t302\t3");
        let ratings = parse_lines(&input, RatingFormat::Tsv, "u.data").unwrap();
        assert_eq!(ratings[1], Rating::new(186, 302, 3.0));
    }

    #[test]
    fn test_missing_field_is_reported() {
        let input = lines("1::10::4\n2::20");
        let err = parse_lines(&input, RatingFormat::Dat, "ratings.dat").unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::FieldCountMismatch { expected: 3, found: 2, line: 2 }
        ));
    }

    #[test]
    fn test_bad_number_is_reported_with_line() {
        let input = lines("1::10::4\n2::x::3");
        let err = parse_lines(&input, RatingFormat::Dat, "ratings.dat").unwrap_err();
        match err {
            DataLoadError::ParseError { file, line, reason } => {
                assert_eq!(file, "ratings.dat");
                assert_eq!(line, 2);
                assert!(reason.contains("itemId"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_finite_rating_rejected() {
        let input = lines("1,10,NaN");
        assert!(parse_lines(&input, RatingFormat::Csv, "ratings.csv").is_err());
    }

    #[test]
    fn test_format_from_str_and_path() {
        assert_eq!("CSV".parse::<RatingFormat>().unwrap(), RatingFormat::Csv);
        assert!("json".parse::<RatingFormat>().is_err());
        assert_eq!(RatingFormat::from_path(Path::new("ml/u.data")), RatingFormat::Tsv);
        assert_eq!(RatingFormat::from_path(Path::new("ratings.dat")), RatingFormat::Dat);
    }

    #[test]
    fn test_write_then_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings.dat");
        let ratings = vec![Rating::new(1, 2, 4.5), Rating::new(3, 4, 1.0)];

        write_ratings(&path, &ratings, RatingFormat::Dat).unwrap();
        let parsed = parse_ratings(&path, RatingFormat::Dat).unwrap();
        assert_eq!(parsed, ratings);
    }
}
