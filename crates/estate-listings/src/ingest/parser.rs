use std::io::Read;

use csv::StringRecord;

use super::{IngestError, RowError};

pub(crate) const STATUS: &str = "status";
pub(crate) const PRICE: &str = "price";
pub(crate) const HOUSE_SIZE: &str = "house_size";
pub(crate) const ACRE_LOT: &str = "acre_lot";
pub(crate) const BED: &str = "bed";
pub(crate) const BATH: &str = "bath";

/// Cell values read as null: the default missing-value markers of common dataframe exports.
const NULL_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// One CSV row with numeric columns parsed. Columns the feed does not carry are ignored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecord {
    pub status: String,
    pub price: Option<f64>,
    pub house_size: Option<f64>,
    pub acre_lot: Option<f64>,
    pub bed: Option<f64>,
    pub bath: Option<f64>,
}

/// A fully parsed feed: header positions plus every data row.
#[derive(Debug)]
pub(crate) struct FeedTable {
    columns: Columns,
    rows: Vec<FeedRow>,
}

#[derive(Debug)]
pub(crate) struct FeedRow {
    pub(crate) line: u64,
    record: StringRecord,
}

#[derive(Debug)]
struct Columns {
    status: usize,
    price: Option<usize>,
    house_size: Option<usize>,
    acre_lot: Option<usize>,
    bed: Option<usize>,
    bath: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self, IngestError> {
        let position = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim_start_matches('\u{feff}') == name)
        };

        let status = position(STATUS).ok_or(IngestError::MalformedRow {
            line: 1,
            reason: RowError::MissingColumn(STATUS),
        })?;

        Ok(Self {
            status,
            price: position(PRICE),
            house_size: position(HOUSE_SIZE),
            acre_lot: position(ACRE_LOT),
            bed: position(BED),
            bath: position(BATH),
        })
    }
}

/// Reads the whole feed before any row is mapped, so a structural defect anywhere in the
/// file surfaces as a parse failure rather than a partially mapped batch.
pub(crate) fn read_table<R: Read>(reader: R) -> Result<FeedTable, IngestError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers().map_err(parse_failure)?.clone();
    if headers.iter().all(|header| header.is_empty()) {
        return Err(IngestError::ParseFailure(
            "no columns to parse from file".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result.map_err(parse_failure)?;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        rows.push(FeedRow { line, record });
    }

    let columns = Columns::locate(&headers)?;
    Ok(FeedTable { columns, rows })
}

fn parse_failure(err: csv::Error) -> IngestError {
    IngestError::ParseFailure(err.to_string())
}

impl FeedTable {
    pub(crate) fn rows(&self) -> &[FeedRow] {
        &self.rows
    }

    pub(crate) fn status<'a>(&self, row: &'a FeedRow) -> &'a str {
        row.record.get(self.columns.status).unwrap_or_default()
    }

    pub(crate) fn raw_record(&self, row: &FeedRow) -> Result<RawRecord, RowError> {
        let columns = &self.columns;
        Ok(RawRecord {
            status: self.status(row).to_string(),
            price: number(row, PRICE, columns.price)?,
            house_size: number(row, HOUSE_SIZE, columns.house_size)?,
            acre_lot: number(row, ACRE_LOT, columns.acre_lot)?,
            bed: number(row, BED, columns.bed)?,
            bath: number(row, BATH, columns.bath)?,
        })
    }
}

fn number(
    row: &FeedRow,
    column: &'static str,
    index: Option<usize>,
) -> Result<Option<f64>, RowError> {
    let index = index.ok_or(RowError::MissingColumn(column))?;
    parse_number(column, row.record.get(index).unwrap_or_default())
}

pub(crate) fn parse_number(column: &'static str, cell: &str) -> Result<Option<f64>, RowError> {
    let cell = cell.trim();
    if NULL_TOKENS.contains(&cell) {
        return Ok(None);
    }

    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(RowError::InvalidNumber {
            column,
            value: cell.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn null_tokens_parse_as_missing() {
        for token in ["", "NA", "NaN", "null", "None", "  "] {
            assert_eq!(parse_number(PRICE, token), Ok(None), "token {token:?}");
        }
        assert_eq!(parse_number(PRICE, "105000.0"), Ok(Some(105_000.0)));
    }

    #[test]
    fn dataframe_export_markers_parse_as_missing() {
        for token in ["<NA>", "-nan", "#NA", "#N/A N/A", "1.#IND", "-1.#IND", "1.#QNAN", "-1.#QNAN"] {
            assert_eq!(parse_number(BATH, token), Ok(None), "token {token:?}");
        }
    }

    #[test]
    fn non_numeric_cells_are_rejected() {
        assert_eq!(
            parse_number(BED, "three"),
            Err(RowError::InvalidNumber {
                column: BED,
                value: "three".to_string()
            })
        );
        assert!(parse_number(BED, "inf").is_err());
    }

    #[test]
    fn table_tracks_source_lines() {
        let table = read_table(Cursor::new(
            "status,price,bed,bath,acre_lot,house_size\nfor_sale,1,1,1,1,1\nsold,2,2,2,2,2\n",
        ))
        .expect("parse");
        let lines: Vec<_> = table.rows().iter().map(|row| row.line).collect();
        assert_eq!(lines, vec![2, 3]);
        assert_eq!(table.status(&table.rows()[1]), "sold");
    }

    #[test]
    fn missing_status_column_is_malformed() {
        let error = read_table(Cursor::new("price,bed\n1,2\n")).expect_err("no status");
        match error {
            IngestError::MalformedRow { line, reason } => {
                assert_eq!(line, 1);
                assert_eq!(reason, RowError::MissingColumn(STATUS));
            }
            other => panic!("expected malformed row, got {other:?}"),
        }
    }

    #[test]
    fn ragged_rows_are_parse_failures() {
        let error = read_table(Cursor::new("status,price\nfor_sale,1,extra\n"))
            .expect_err("unequal lengths");
        assert!(matches!(error, IngestError::ParseFailure(_)));
    }

    #[test]
    fn empty_input_is_a_parse_failure() {
        let error = read_table(Cursor::new("")).expect_err("empty file");
        assert!(matches!(error, IngestError::ParseFailure(_)));
    }

    #[test]
    fn missing_numeric_column_surfaces_per_row() {
        let table = read_table(Cursor::new("status,price\nfor_sale,100\n")).expect("parse");
        let error = table
            .raw_record(&table.rows()[0])
            .expect_err("house_size absent");
        assert_eq!(error, RowError::MissingColumn(HOUSE_SIZE));
    }
}
