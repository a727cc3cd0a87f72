//! Spreadsheet export of the transactions on the monitor.

use std::sync::Arc;

use axum::{
    extract::{FromRef, State},
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};

use crate::{
    AppState, Error,
    monitor::MonitorSession,
    timezone::ReferenceZone,
    transaction::{DateRange, TransactionRecord, historical_display_item},
};

/// Spreadsheet programs need the byte order mark to read accents in UTF-8 CSV.
const BYTE_ORDER_MARK: &str = "\u{feff}";

/// A rendered export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    /// The suggested file name.
    pub filename: String,
    /// The CSV text.
    pub contents: String,
}

/// The text after the first `|` in a captured notification, if any.
fn notification_message(record: &TransactionRecord) -> String {
    record
        .original_message
        .as_deref()
        .and_then(|message| message.split('|').nth(1))
        .unwrap_or_default()
        .to_owned()
}

/// Write `records` as CSV with a title row naming `range`.
///
/// # Errors
/// Returns [Error::NoDataToExport] if there are no records, or [Error::Csv]
/// if the CSV could not be written.
pub fn export_transactions(
    range: DateRange,
    records: &[TransactionRecord],
    zone: &ReferenceZone,
) -> Result<ExportFile, Error> {
    if records.is_empty() {
        return Err(Error::NoDataToExport);
    }

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_record([format!("Transacciones - {} y {}", range.start, range.end)])?;
    writer.write_record(["Remitente", "Fecha", "Monto", "Código Pago", "Mensaje"])?;

    for record in records {
        let item = historical_display_item(record, zone);

        writer.write_record([
            item.sender,
            item.date,
            format!("{} {}", item.currency, item.amount),
            item.payment_code,
            notification_message(record),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| Error::Csv(error.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|error| Error::Csv(error.to_string()))?;

    Ok(ExportFile {
        filename: format!("transacciones_{}_{}.csv", range.start, range.end),
        contents: format!("{BYTE_ORDER_MARK}{text}"),
    })
}

/// The state needed for exporting.
#[derive(Clone)]
pub struct ExportState {
    /// The monitor, if the signed in role has one.
    pub monitor: Option<Arc<MonitorSession>>,
}

impl FromRef<AppState> for ExportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            monitor: state.monitor.clone(),
        }
    }
}

/// Download the visible transactions as CSV.
pub async fn get_export(State(state): State<ExportState>) -> Response {
    let Some(monitor) = state.monitor else {
        return Error::NotFound.into_alert_response();
    };

    let result = monitor
        .visible_records()
        .and_then(|(range, records)| export_transactions(range, &records, monitor.zone()));

    match result {
        Ok(file) => {
            tracing::info!("exporting {}", file.filename);

            (
                StatusCode::OK,
                [
                    (CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
                    (
                        CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", file.filename),
                    ),
                ],
                file.contents,
            )
                .into_response()
        }
        Err(error) => error.into_alert_response(),
    }
}
