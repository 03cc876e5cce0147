use crate::application::orchestrator::{PaymentRequest, TripClaim};
use crate::domain::geo::Coordinates;
use crate::domain::money::Amount;
use crate::domain::transaction::OriginProvenance;
use crate::error::PaymentError;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a payments CSV, before validation.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct PaymentRow {
    pub reference: String,
    pub user_id: String,
    pub device_token: String,
    pub amount: Decimal,
    pub pin: String,
    pub origin_stop: Option<String>,
    pub destination_stop: Option<String>,
    pub origin_source: Option<OriginProvenance>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl TryFrom<PaymentRow> for PaymentRequest {
    type Error = PaymentError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let payer_fix = match (row.lat, row.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)?),
            (None, None) => None,
            _ => {
                return Err(PaymentError::InvalidCoordinate(
                    "lat and lon must be given together".to_string(),
                ));
            }
        };

        let trip = match row.origin_stop {
            Some(origin_stop_id) => Some(TripClaim {
                origin_stop_id,
                destination_stop_id: row.destination_stop,
                provenance: row.origin_source.ok_or_else(|| {
                    PaymentError::InvalidInput("origin_source is required with origin_stop".into())
                })?,
            }),
            None if row.destination_stop.is_some() => {
                return Err(PaymentError::InvalidInput(
                    "destination_stop requires origin_stop".into(),
                ));
            }
            None => None,
        };

        Ok(PaymentRequest {
            user_id: row.user_id,
            device_token: row.device_token,
            amount: Amount::new(row.amount)?,
            pin: row.pin,
            reference_code: row.reference,
            trip,
            payer_fix,
        })
    }
}

/// Reads payment requests from a CSV source.
///
/// Wraps `csv::Reader`, trimming whitespace and treating empty cells as
/// absent values.
pub struct PaymentReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> PaymentReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes rows, so large files are streamed rather than
    /// loaded whole.
    pub fn rows(self) -> impl Iterator<Item = Result<PaymentRow, csv::Error>> {
        self.reader.into_deserialize()
    }
}
