use crate::types::{CleanShipment, CustomerRow, MartRow, Status};
use crate::util::mean_days;
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::error::Error;

/// A cleaned shipment after the customer join. `customer_name` is `None`
/// when the shipment's `customer_id` has no match in the reference table.
#[derive(Debug, Clone)]
pub struct JoinedShipment {
    pub shipment: CleanShipment,
    pub customer_name: Option<String>,
}

/// Load the cleaned shipment dataset written by the transform stage.
pub fn load_clean(path: &str) -> Result<Vec<CleanShipment>, Box<dyn Error>> {
    let mut rdr = ReaderBuilder::new().from_path(path)?;
    let headers = rdr.headers()?.clone();
    for col in ["shipment_id", "customer_id", "status", "booked_date"] {
        if !headers.iter().any(|h| h == col) {
            return Err(format!("{}: missing required column '{}'", path, col).into());
        }
    }
    let mut rows = Vec::new();
    for result in rdr.deserialize::<CleanShipment>() {
        rows.push(result?);
    }
    Ok(rows)
}

/// Load the customer reference table. Columns beyond the key and name are
/// ignored.
pub fn load_customers(path: &str) -> Result<Vec<CustomerRow>, Box<dyn Error>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = rdr.headers()?.clone();
    for col in ["customer_id", "customer_name"] {
        if !headers.iter().any(|h| h == col) {
            return Err(format!("{}: missing required column '{}'", path, col).into());
        }
    }
    let mut rows = Vec::new();
    for result in rdr.deserialize::<CustomerRow>() {
        rows.push(result?);
    }
    Ok(rows)
}

/// Left join shipments to the customer reference on `customer_id`.
///
/// Every shipment survives the join; unmatched ones carry a null customer
/// name. Customers with no shipments contribute nothing, since grouping runs
/// over the joined shipments.
pub fn join_customers(
    shipments: &[CleanShipment],
    customers: &[CustomerRow],
) -> Vec<JoinedShipment> {
    let by_id: HashMap<&str, &str> = customers
        .iter()
        .map(|c| (c.customer_id.as_str(), c.customer_name.as_str()))
        .collect();
    shipments
        .iter()
        .map(|s| JoinedShipment {
            shipment: s.clone(),
            customer_name: by_id.get(s.customer_id.as_str()).map(|n| n.to_string()),
        })
        .collect()
}

/// Calendar-month grouping key (`YYYY-MM`) from an optional booked date.
pub fn month_key(date: Option<chrono::NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m").to_string())
}

/// Group joined shipments by `(customer_id, customer_name, month_year)` and
/// compute the per-group performance aggregates.
///
/// `delayed_rate` is forced to 0 for groups with no delivered shipments; the
/// mart is a BI artifact and must not carry NaN/undefined rates. Output is
/// sorted by `(customer_id, month_year)` so repeated runs produce identical
/// files.
pub fn aggregate(joined: &[JoinedShipment]) -> Vec<MartRow> {
    #[derive(Default)]
    struct Acc {
        total: usize,
        delivered: usize,
        on_process: usize,
        cancelled: usize,
        delayed: usize,
        durations: Vec<i64>,
    }

    type GroupKey = (String, Option<String>, Option<String>);
    let mut map: HashMap<GroupKey, Acc> = HashMap::new();
    for j in joined {
        let key = (
            j.shipment.customer_id.clone(),
            j.customer_name.clone(),
            month_key(j.shipment.booked_date),
        );
        let acc = map.entry(key).or_default();
        acc.total += 1;
        match j.shipment.status {
            Status::Delivered => acc.delivered += 1,
            Status::InTransit | Status::Pending => acc.on_process += 1,
            Status::Cancelled => acc.cancelled += 1,
            Status::Other(_) => {}
        }
        if j.shipment.is_delayed {
            acc.delayed += 1;
        }
        if let Some(d) = j.shipment.delivery_duration_days {
            acc.durations.push(d);
        }
    }

    let mut rows: Vec<MartRow> = map
        .into_iter()
        .map(|((customer_id, customer_name, month_year), acc)| {
            let delayed_rate = if acc.delivered == 0 {
                0.0
            } else {
                acc.delayed as f64 / acc.delivered as f64
            };
            MartRow {
                customer_id,
                customer_name,
                month_year,
                total_shipments: acc.total,
                delivered_shipments: acc.delivered,
                on_process_shipments: acc.on_process,
                cancelled_shipments: acc.cancelled,
                avg_delivery_days: mean_days(&acc.durations),
                delayed_shipments: acc.delayed,
                delayed_rate,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        a.customer_id
            .cmp(&b.customer_id)
            .then_with(|| a.month_year.cmp(&b.month_year))
    });
    rows
}

/// Full aggregation stage over in-memory inputs: join, then aggregate.
pub fn build_mart(shipments: &[CleanShipment], customers: &[CustomerRow]) -> Vec<MartRow> {
    aggregate(&join_customers(shipments, customers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn shipment(id: &str, customer: &str, status: Status, booked: &str) -> CleanShipment {
        CleanShipment {
            shipment_id: id.to_string(),
            customer_id: customer.to_string(),
            status,
            booked_date: Some(date(booked)),
            estimated_delivery_date: None,
            delivered_date: None,
            delivery_duration_days: None,
            delivery_delay_days: None,
            is_delayed: false,
        }
    }

    fn delivered(id: &str, customer: &str, booked: &str, duration: i64, delayed: bool) -> CleanShipment {
        let booked = date(booked);
        CleanShipment {
            shipment_id: id.to_string(),
            customer_id: customer.to_string(),
            status: Status::Delivered,
            booked_date: Some(booked),
            estimated_delivery_date: None,
            delivered_date: Some(booked + chrono::Duration::days(duration)),
            delivery_duration_days: Some(duration),
            delivery_delay_days: Some(if delayed { 1 } else { 0 }),
            is_delayed: delayed,
        }
    }

    fn customers() -> Vec<CustomerRow> {
        vec![
            CustomerRow {
                customer_id: "C1".to_string(),
                customer_name: "Acme Logistics".to_string(),
            },
            CustomerRow {
                customer_id: "C2".to_string(),
                customer_name: "Blue Harbor".to_string(),
            },
        ]
    }

    #[test]
    fn join_keeps_unmatched_shipments_with_null_name() {
        let shipments = vec![
            shipment("S1", "C1", Status::Pending, "2024-01-01"),
            shipment("S2", "C9", Status::Pending, "2024-01-01"),
        ];
        let joined = join_customers(&shipments, &customers());
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].customer_name.as_deref(), Some("Acme Logistics"));
        assert_eq!(joined[1].customer_name, None);
    }

    #[test]
    fn month_key_is_sortable_year_month() {
        assert_eq!(month_key(Some(date("2024-03-15"))), Some("2024-03".to_string()));
        assert_eq!(month_key(None), None);
    }

    #[test]
    fn groups_split_by_customer_and_month() {
        let shipments = vec![
            shipment("S1", "C1", Status::Pending, "2024-01-10"),
            shipment("S2", "C1", Status::Pending, "2024-02-10"),
            shipment("S3", "C2", Status::Pending, "2024-01-10"),
        ];
        let mart = build_mart(&shipments, &customers());
        assert_eq!(mart.len(), 3);
        assert_eq!(mart[0].month_year.as_deref(), Some("2024-01"));
        assert_eq!(mart[1].month_year.as_deref(), Some("2024-02"));
        assert_eq!(mart[2].customer_id, "C2");
    }

    #[test]
    fn counts_are_conserved_across_status_buckets() {
        let shipments = vec![
            delivered("S1", "C1", "2024-01-01", 3, true),
            shipment("S2", "C1", Status::InTransit, "2024-01-02"),
            shipment("S3", "C1", Status::Pending, "2024-01-03"),
            shipment("S4", "C1", Status::Cancelled, "2024-01-04"),
            shipment("S5", "C1", Status::Other("Lost".to_string()), "2024-01-05"),
        ];
        let mart = build_mart(&shipments, &customers());
        assert_eq!(mart.len(), 1);
        let row = &mart[0];
        assert_eq!(row.total_shipments, 5);
        assert_eq!(row.delivered_shipments, 1);
        assert_eq!(row.on_process_shipments, 2);
        assert_eq!(row.cancelled_shipments, 1);
        // "Lost" is counted in the total but in no named bucket.
        assert_eq!(
            row.total_shipments,
            row.delivered_shipments + row.on_process_shipments + row.cancelled_shipments + 1
        );
    }

    #[test]
    fn avg_delivery_days_covers_only_delivered_durations() {
        let shipments = vec![
            delivered("S1", "C1", "2024-01-01", 2, false),
            delivered("S2", "C1", "2024-01-02", 4, true),
            shipment("S3", "C1", Status::Pending, "2024-01-03"),
        ];
        let mart = build_mart(&shipments, &customers());
        let row = &mart[0];
        assert_eq!(row.avg_delivery_days, Some(3.0));
        assert_eq!(row.delayed_shipments, 1);
        assert!((row.delayed_rate - 0.5).abs() < f64::EPSILON);
        assert!(row.delayed_shipments <= row.delivered_shipments);
    }

    #[test]
    fn group_without_deliveries_has_zero_rate_and_no_avg() {
        let shipments = vec![
            shipment("S1", "C1", Status::Pending, "2024-01-01"),
            shipment("S2", "C1", Status::Cancelled, "2024-01-02"),
        ];
        let mart = build_mart(&shipments, &customers());
        let row = &mart[0];
        assert_eq!(row.delivered_shipments, 0);
        assert_eq!(row.delayed_shipments, 0);
        assert_eq!(row.delayed_rate, 0.0);
        assert_eq!(row.avg_delivery_days, None);
    }

    #[test]
    fn missing_booked_date_groups_under_null_month() {
        let mut s = shipment("S1", "C1", Status::Pending, "2024-01-01");
        s.booked_date = None;
        let mart = build_mart(&[s], &customers());
        assert_eq!(mart.len(), 1);
        assert_eq!(mart[0].month_year, None);
        assert_eq!(mart[0].total_shipments, 1);
    }
}
