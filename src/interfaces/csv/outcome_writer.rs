use crate::application::orchestrator::PaymentReceipt;
use crate::error::PaymentError;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize, PartialEq)]
pub struct OutcomeRow {
    pub reference: String,
    pub status: &'static str,
    pub transaction_id: Option<String>,
    pub amount: Option<Decimal>,
    pub commission: Option<Decimal>,
    pub net_amount: Option<Decimal>,
    pub balance_after: Option<Decimal>,
    pub error: Option<&'static str>,
}

impl OutcomeRow {
    pub fn from_result(reference: &str, result: &Result<PaymentReceipt, PaymentError>) -> Self {
        match result {
            Ok(receipt) => Self {
                reference: receipt.reference_code.clone(),
                status: "success",
                transaction_id: Some(receipt.transaction_id.to_string()),
                amount: Some(receipt.amount),
                commission: Some(receipt.commission),
                net_amount: Some(receipt.net_amount),
                balance_after: Some(receipt.balance_after.0),
                error: None,
            },
            Err(e) => Self {
                reference: reference.to_string(),
                status: "failed",
                transaction_id: None,
                amount: None,
                commission: None,
                net_amount: None,
                balance_after: None,
                error: Some(e.code()),
            },
        }
    }
}

/// Writes one CSV row per processed payment.
pub struct OutcomeWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OutcomeWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write(&mut self, row: &OutcomeRow) -> Result<(), csv::Error> {
        self.writer.serialize(row)
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}
