use crate::types::{CleanShipment, RawShipmentRow, Status};
use crate::util::parse_date_safe;
use csv::ReaderBuilder;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::error::Error;

/// Columns the raw shipment file must carry. Extra passthrough columns are
/// tolerated; a missing one is a structural failure, not a row-level one.
pub const RAW_COLUMNS: [&str; 6] = [
    "shipment_id",
    "customer_id",
    "status",
    "booked_date",
    "estimated_delivery_date",
    "delivered_date",
];

/// Diagnostics collected while cleaning. Printed to the console and written
/// out as `quality_report.json`; never consumed by the aggregation stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransformReport {
    pub total_rows: usize,
    pub deserialize_errors: usize,
    pub duplicates_removed: usize,
    /// Missing `delivered_date` tally per normalized status, measured after
    /// deduplication and before any rows are dropped.
    pub missing_delivered_date_by_status: BTreeMap<String, usize>,
    pub dropped_missing_delivered_date: usize,
    pub dropped_negative_duration: usize,
    pub output_rows: usize,
}

/// Load the raw shipment CSV and run the full cleaning pipeline over it.
///
/// Rows that fail CSV deserialization are skipped and counted; a file that
/// cannot be opened or lacks a required column fails outright.
pub fn load_and_clean(path: &str) -> Result<(Vec<CleanShipment>, TransformReport), Box<dyn Error>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = rdr.headers()?.clone();
    for col in RAW_COLUMNS {
        if !headers.iter().any(|h| h == col) {
            return Err(format!("{}: missing required column '{}'", path, col).into());
        }
    }

    let mut total_rows = 0usize;
    let mut deserialize_errors = 0usize;
    let mut raw: Vec<RawShipmentRow> = Vec::new();
    for result in rdr.deserialize::<RawShipmentRow>() {
        total_rows += 1;
        match result {
            Ok(r) => raw.push(r),
            Err(_) => deserialize_errors += 1,
        }
    }

    let (clean, mut report) = clean_shipments(raw);
    report.total_rows = total_rows;
    report.deserialize_errors = deserialize_errors;
    Ok((clean, report))
}

/// Clean a batch of raw shipment rows.
///
/// Steps, in order, each over the whole batch:
/// 1. normalize `status` through the fixed vocabulary (title-case fallback),
/// 2. coerce the three date columns (`unparseable -> None`),
/// 3. drop exact full-row duplicates (first occurrence wins),
/// 4. drop `Delivered` rows with no `delivered_date`,
/// 5. derive duration/delay/`is_delayed` for `Delivered` rows,
/// 6. drop `Delivered` rows whose duration came out negative.
///
/// Input order is preserved minus the dropped rows. Data-quality issues are
/// counted in the report, never raised.
pub fn clean_shipments(raw: Vec<RawShipmentRow>) -> (Vec<CleanShipment>, TransformReport) {
    let mut report = TransformReport::default();
    report.total_rows = raw.len();

    let typed: Vec<CleanShipment> = raw
        .into_iter()
        .map(|row| CleanShipment {
            shipment_id: row.shipment_id.unwrap_or_default().trim().to_string(),
            customer_id: row.customer_id.unwrap_or_default().trim().to_string(),
            status: Status::normalize(row.status.as_deref().unwrap_or("")),
            booked_date: parse_date_safe(row.booked_date.as_deref()),
            estimated_delivery_date: parse_date_safe(row.estimated_delivery_date.as_deref()),
            delivered_date: parse_date_safe(row.delivered_date.as_deref()),
            delivery_duration_days: None,
            delivery_delay_days: None,
            is_delayed: false,
        })
        .collect();

    // Dedup on the full typed row; the derived fields are all still at their
    // defaults here, so equality means "all six source fields identical".
    let mut seen: HashSet<CleanShipment> = HashSet::new();
    let mut rows: Vec<CleanShipment> = Vec::new();
    for row in typed {
        if seen.insert(row.clone()) {
            rows.push(row);
        } else {
            report.duplicates_removed += 1;
        }
    }

    for row in &rows {
        let entry = report
            .missing_delivered_date_by_status
            .entry(row.status.label().to_string())
            .or_insert(0);
        if row.delivered_date.is_none() {
            *entry += 1;
        }
    }

    // Delivered rows must have a delivered_date; violators are removed, not
    // repaired.
    rows.retain(|row| {
        let invalid = row.status == Status::Delivered && row.delivered_date.is_none();
        if invalid {
            report.dropped_missing_delivered_date += 1;
        }
        !invalid
    });

    for row in &mut rows {
        if row.status != Status::Delivered {
            continue;
        }
        if let (Some(booked), Some(delivered)) = (row.booked_date, row.delivered_date) {
            row.delivery_duration_days = Some((delivered - booked).num_days());
        }
        if let (Some(estimated), Some(delivered)) =
            (row.estimated_delivery_date, row.delivered_date)
        {
            let delay = (delivered - estimated).num_days();
            row.delivery_delay_days = Some(delay);
            row.is_delayed = delay > 0;
        }
    }

    // Delivered before booked is impossible; such rows are bad data.
    rows.retain(|row| {
        let invalid = row.status == Status::Delivered
            && matches!(row.delivery_duration_days, Some(d) if d < 0);
        if invalid {
            report.dropped_negative_duration += 1;
        }
        !invalid
    });

    report.output_rows = rows.len();
    (rows, report)
}
