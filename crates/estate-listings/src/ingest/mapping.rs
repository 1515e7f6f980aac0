use super::convert::{truncate_to_i32, ConversionRates};
use super::parser::{FeedRow, FeedTable, RawRecord, BATH, PRICE};
use super::{IngestError, RowError};
use crate::listings::ListingDraft;

/// Status marker of rows that describe a listing for sale.
pub const FOR_SALE: &str = "for_sale";

/// Result of mapping one feed row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Listing(ListingDraft),
    /// Filtered out by status. Not an error.
    Skipped,
}

pub fn is_for_sale(status: &str) -> bool {
    status.trim() == FOR_SALE
}

/// Converts one raw record into a draft listing or a row-level rejection.
pub fn map_record(record: &RawRecord, rates: &ConversionRates) -> Result<RowOutcome, RowError> {
    if !is_for_sale(&record.status) {
        return Ok(RowOutcome::Skipped);
    }

    let price = rates
        .price_eur(record.price)
        .map_err(|source| RowError::Conversion {
            column: PRICE,
            source,
        })?;
    let bathrooms = record
        .bath
        .map(truncate_to_i32)
        .transpose()
        .map_err(|source| RowError::Conversion {
            column: BATH,
            source,
        })?;

    // The feed carries no registration, parking, or construction year columns.
    Ok(RowOutcome::Listing(ListingDraft {
        square_footage: rates.square_meters(record.house_size),
        price,
        rooms: record.bed,
        bathrooms,
        land_area: rates.land_area_m2(record.acre_lot),
        registration: false,
        parking: false,
        construction_year: None,
    }))
}

/// Maps a parsed feed row, only parsing numeric cells of rows that survive the status filter.
pub(crate) fn map_row(
    table: &FeedTable,
    row: &FeedRow,
    rates: &ConversionRates,
) -> Result<RowOutcome, IngestError> {
    if !is_for_sale(table.status(row)) {
        return Ok(RowOutcome::Skipped);
    }

    let malformed = |reason| IngestError::MalformedRow {
        line: row.line,
        reason,
    };
    let record = table.raw_record(row).map_err(malformed)?;
    map_record(&record, rates).map_err(malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::convert::ConversionError;

    fn for_sale() -> RawRecord {
        RawRecord {
            status: "for_sale".to_string(),
            price: Some(500_000.0),
            house_size: Some(1000.0),
            acre_lot: Some(0.5),
            bed: Some(3.0),
            bath: Some(2.0),
        }
    }

    #[test]
    fn maps_reference_scenario() {
        let draft = match map_record(&for_sale(), &ConversionRates::default()) {
            Ok(RowOutcome::Listing(draft)) => draft,
            other => panic!("expected listing, got {other:?}"),
        };

        assert_eq!(draft.price, Some(460_000));
        assert!((draft.square_footage.expect("area") - 92.903).abs() < 1e-9);
        assert!((draft.land_area.expect("land") - 2023.5).abs() < 1e-9);
        assert_eq!(draft.rooms, Some(3.0));
        assert_eq!(draft.bathrooms, Some(2));
        assert!(!draft.registration);
        assert!(!draft.parking);
        assert_eq!(draft.construction_year, None);
    }

    #[test]
    fn other_statuses_are_skipped() {
        for status in ["for_rent", "sold", "FOR_SALE", ""] {
            let record = RawRecord {
                status: status.to_string(),
                ..for_sale()
            };
            assert_eq!(
                map_record(&record, &ConversionRates::default()),
                Ok(RowOutcome::Skipped),
                "status {status:?}"
            );
        }
    }

    #[test]
    fn null_cells_stay_null() {
        let record = RawRecord {
            status: "for_sale".to_string(),
            ..RawRecord::default()
        };
        let outcome = map_record(&record, &ConversionRates::default()).expect("maps");
        assert_eq!(outcome, RowOutcome::Listing(ListingDraft::default()));
    }

    #[test]
    fn fractional_bathrooms_truncate() {
        let record = RawRecord {
            bath: Some(2.5),
            ..for_sale()
        };
        match map_record(&record, &ConversionRates::default()).expect("maps") {
            RowOutcome::Listing(draft) => assert_eq!(draft.bathrooms, Some(2)),
            other => panic!("expected listing, got {other:?}"),
        }
    }

    #[test]
    fn oversized_price_is_rejected() {
        let record = RawRecord {
            price: Some(9.0e12),
            ..for_sale()
        };
        match map_record(&record, &ConversionRates::default()) {
            Err(RowError::Conversion { column, source }) => {
                assert_eq!(column, PRICE);
                assert!(matches!(source, ConversionError::OutOfRange(_)));
            }
            other => panic!("expected conversion error, got {other:?}"),
        }
    }
}
