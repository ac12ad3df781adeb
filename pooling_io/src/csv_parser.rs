use anyhow::{anyhow, bail, Context, Result};
use csv::StringRecord;
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Decode the bytes of an instrument export. UTF-8 is tried first; anything
/// else is read as Latin-1, where every byte is the code point of the same
/// value. Windows exports write the µ of `pg/µl` as a single 0xB5 byte.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s.strip_prefix('\u{feff}').unwrap_or(s)),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}

/// Helper class for parsing instrument CSV exports, validating them & providing good error messages
pub struct CsvParser {
    filetype: String,
    filename: PathBuf,
    headers: Vec<String>,
    rows: Vec<StringRecord>,
    col_map: HashMap<String, usize>,
    line: usize,
}

impl CsvParser {
    /// Read and decode `filename`, then parse it. See [`CsvParser::from_text`].
    pub fn new<T: AsRef<str>>(
        filename: &Path,
        required_headers: impl IntoIterator<Item = T>,
        filetype: &str,
    ) -> Result<CsvParser> {
        let bytes = std::fs::read(filename).with_context(|| filename.display().to_string())?;
        CsvParser::from_text(&decode_text(&bytes), filename, required_headers, filetype)
    }

    /// Create a CSV parser / validator for the contents of file `filename`. `required_headers` are checked and an
    /// error will be returned if they're not present. `filetype` is a readable description of the kind of CSV file
    /// being parsed and will be used in error messages.
    pub fn from_text<T: AsRef<str>>(
        text: &str,
        filename: &Path,
        required_headers: impl IntoIterator<Item = T>,
        filetype: &str,
    ) -> Result<CsvParser> {
        let mut rdr = csv::Reader::from_reader(text.as_bytes());

        let mut headers = rdr
            .headers()
            .with_context(|| filename.display().to_string())?
            .clone();
        headers.trim();
        let headers: Vec<_> = headers.iter().map(String::from).collect();

        let mut rows = Vec::new();
        for result in rdr.records() {
            let mut record = result.with_context(|| filename.display().to_string())?;
            record.trim();
            if record.iter().all(str::is_empty) {
                continue;
            }
            rows.push(record);
        }

        let col_map = CsvParser::check_headers(filename, required_headers, &headers)?;

        Ok(CsvParser {
            filetype: filetype.to_string(),
            filename: filename.to_path_buf(),
            headers,
            rows,
            col_map,
            line: 0,
        })
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// File name
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Headers found in CSV
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// First header satisfying `pred`.
    pub fn find_header(&self, pred: impl Fn(&str) -> bool) -> Option<&str> {
        self.headers
            .iter()
            .map(String::as_str)
            .find(|h| pred(h))
    }

    /// Set the line number (not including the header) to pull data from
    pub fn set_line(&mut self, line: usize) {
        self.line = line;
    }

    /// 1-based line of the current row in the file, counting the header.
    fn file_line(&self) -> u64 {
        let row = &self.rows[self.line];
        row.position()
            .map_or(self.line as u64 + 2, csv::Position::line)
    }

    fn cell(&self, col: &str) -> Result<&str> {
        let i = *self.col_map.get(col).ok_or_else(|| {
            anyhow!(
                "Error in {} file '{}'. No column named '{col}'",
                self.filetype,
                self.filename.display()
            )
        })?;
        Ok(self.rows[self.line].get(i).unwrap_or_default().trim())
    }

    /// Get a value of type `T` from column `col` on the current line.
    /// Returns an error if the column doesn't exist or the contents of the
    /// cell cannot be parsed as `T`. Returns Ok(None) for an empty field
    pub fn try_parse_field<T>(&self, col: &str, expected: &str) -> Result<Option<T>>
    where
        T: FromStr,
        Result<T, <T as FromStr>::Err>: anyhow::Context<T, <T as FromStr>::Err>,
    {
        let v = self.cell(col)?;
        if v.is_empty() {
            return Ok(None);
        }

        Ok(Some(v.parse::<T>().with_context(|| {
            format!(
                "Error in {} file '{}'. On line {} in '{col}' column: \
                 Expected a {expected} but received '{v}'",
                self.filetype,
                self.filename.display(),
                self.file_line()
            )
        })?))
    }

    /// Like `try_parse_field`, but an empty field is an error.
    pub fn parse_field<T>(&self, col: &str, expected: &str) -> Result<T>
    where
        T: FromStr,
        Result<T, <T as FromStr>::Err>: anyhow::Context<T, <T as FromStr>::Err>,
    {
        match self.try_parse_field(col, expected) {
            Err(e) => Err(e),
            Ok(Some(v)) => Ok(v),
            Ok(None) => {
                bail!(
                    "Error in {} file '{}'. On line {} in '{col}' column: \
                     Expected a {expected}, but got empty value",
                    self.filetype,
                    self.filename.display(),
                    self.file_line(),
                );
            }
        }
    }

    /// Get a string from column `col` on the current line.
    /// Returns an error on an empty string or a missing column
    pub fn require_string(&self, col: &str) -> Result<String> {
        self.try_get_string(col)?.ok_or_else(|| {
            anyhow!(
                "Error in {} file '{}'. On line {} in '{col}' column: \
                 Value required but cell is empty.",
                self.filetype,
                self.filename.display(),
                self.file_line(),
            )
        })
    }

    /// Get a string from column `col` on the current line.
    /// Returns None for an empty string
    pub fn try_get_string(&self, col: &str) -> Result<Option<String>> {
        let val = self.cell(col)?;
        Ok(if val.is_empty() {
            None
        } else {
            Some(val.to_string())
        })
    }

    fn check_headers<T: AsRef<str>>(
        file_arg: &Path,
        required: impl IntoIterator<Item = T>,
        headers: &[String],
    ) -> Result<HashMap<String, usize>> {
        let mut result = HashMap::new();

        // check that we have required headers
        for r in required {
            if !headers.iter().any(|h| h == r.as_ref()) {
                bail!(
                    "The input file '{}' must contain a column named '{}', but it was not found. \
                    Please check the headers in the CSV file.",
                    file_arg.display(),
                    r.as_ref()
                );
            }
        }

        // column name to column index map, first occurrence wins
        for (i, h) in headers.iter().enumerate() {
            result.entry(h.to_string()).or_insert(i);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_text() {
        assert_eq!(decode_text("Conc. [pg/µl]".as_bytes()), "Conc. [pg/µl]");
        assert_eq!(decode_text(b"Conc. [pg/\xb5l]"), "Conc. [pg/µl]");
        assert_eq!(decode_text("\u{feff}WellId".as_bytes()), "WellId");
    }

    #[test]
    fn test_parse_fields() -> Result<()> {
        let text = " WellId , From [bp],Note\nA1, 35 ,\n,,\nB2,x,hello\n";
        let mut parser = CsvParser::from_text(
            text,
            Path::new("table.csv"),
            ["WellId", "From [bp]"],
            "region table",
        )?;
        assert_eq!(parser.headers(), &["WellId", "From [bp]", "Note"]);
        // row without any values dropped
        assert_eq!(parser.len(), 2);

        assert_eq!(parser.require_string("WellId")?, "A1");
        assert_eq!(parser.parse_field::<u32>("From [bp]", "number")?, 35);
        assert_eq!(parser.try_get_string("Note")?, None);

        parser.set_line(1);
        let err = parser
            .parse_field::<u32>("From [bp]", "number")
            .unwrap_err()
            .to_string();
        assert_eq!(
            err,
            "Error in region table file 'table.csv'. On line 4 in 'From [bp]' column: \
             Expected a number but received 'x'"
        );
        assert!(parser.try_get_string("Missing").is_err());
        Ok(())
    }

    #[test]
    fn test_missing_required_header() {
        let err = CsvParser::from_text(
            "WellId\nA1\n",
            Path::new("table.csv"),
            ["WellId", "To [bp]"],
            "region table",
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("'To [bp]'"));
    }
}
