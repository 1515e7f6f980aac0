//! Unit and currency conversions applied to US listing feeds.
//!
//! Every converter is null-safe: `None` in gives `None` out, so a missing source cell never
//! turns into a zero in the store.

/// Conversion constants for one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionRates {
    /// Fixed USD to EUR rate. Not a live quote.
    pub usd_to_eur: f64,
    pub sqft_to_m2: f64,
    pub acre_to_m2: f64,
}

impl ConversionRates {
    pub const USD_TO_EUR: f64 = 0.92;
    pub const SQFT_TO_M2: f64 = 0.092903;
    pub const ACRE_TO_M2: f64 = 4047.0;
}

impl Default for ConversionRates {
    fn default() -> Self {
        Self {
            usd_to_eur: Self::USD_TO_EUR,
            sqft_to_m2: Self::SQFT_TO_M2,
            acre_to_m2: Self::ACRE_TO_M2,
        }
    }
}

/// Failure converting a present value into its target representation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("value {0} is not a finite number")]
    NotFinite(f64),
    #[error("value {0} does not fit in a 32-bit integer")]
    OutOfRange(f64),
}

impl ConversionRates {
    /// Truncates toward zero after applying the exchange rate.
    pub fn price_eur(&self, price_usd: Option<f64>) -> Result<Option<i32>, ConversionError> {
        price_usd
            .map(|usd| truncate_to_i32(usd * self.usd_to_eur))
            .transpose()
    }

    pub fn square_meters(&self, house_size_sqft: Option<f64>) -> Option<f64> {
        house_size_sqft.map(|sqft| sqft * self.sqft_to_m2)
    }

    pub fn land_area_m2(&self, acre_lot: Option<f64>) -> Option<f64> {
        acre_lot.map(|acres| acres * self.acre_to_m2)
    }
}

pub(crate) fn truncate_to_i32(value: f64) -> Result<i32, ConversionError> {
    if !value.is_finite() {
        return Err(ConversionError::NotFinite(value));
    }

    let truncated = value.trunc();
    if truncated < f64::from(i32::MIN) || truncated > f64::from(i32::MAX) {
        return Err(ConversionError::OutOfRange(value));
    }

    Ok(truncated as i32)
}
