use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tabled::Tabled;

use crate::util::{display_option, title_case};

/// Canonical shipment status vocabulary.
///
/// Raw files spell these with inconsistent casing/spacing ("in-transit",
/// " Delivered ", ...). `Status::normalize` maps the known spellings onto the
/// canonical variants; anything unrecognized is preserved as `Other` with the
/// original text title-cased, so unknown statuses survive the pipeline
/// instead of being discarded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    InTransit,
    Delivered,
    Pending,
    Cancelled,
    Other(String),
}

impl Status {
    pub fn normalize(raw: &str) -> Status {
        match raw.trim().to_lowercase().as_str() {
            "in transit" | "in-transit" => Status::InTransit,
            "delivered" => Status::Delivered,
            "pending" => Status::Pending,
            "cancelled" => Status::Cancelled,
            other => Status::Other(title_case(other)),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Status::InTransit => "In Transit",
            Status::Delivered => "Delivered",
            Status::Pending => "Pending",
            Status::Cancelled => "Cancelled",
            Status::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Serialized as the canonical label. Deserialization re-normalizes, which is
// a no-op for labels this crate wrote (normalization is idempotent).
impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Status::normalize(&s))
    }
}

/// One row of the raw shipment CSV, exactly as it appears on disk.
///
/// Every field is optional text so malformed cells deserialize instead of
/// aborting the run; coercion to typed values happens in the transform stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct RawShipmentRow {
    pub shipment_id: Option<String>,
    pub customer_id: Option<String>,
    pub status: Option<String>,
    pub booked_date: Option<String>,
    pub estimated_delivery_date: Option<String>,
    pub delivered_date: Option<String>,
}

/// A cleaned, typed shipment transaction.
///
/// The three derived fields are only defined for `Delivered` rows; for every
/// other status `delivery_duration_days` and `delivery_delay_days` stay
/// `None` and `is_delayed` stays `false`. This is the schema of the
/// intermediate `shipment_transformed.csv` artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Tabled)]
pub struct CleanShipment {
    pub shipment_id: String,
    pub customer_id: String,
    pub status: Status,
    #[tabled(display_with = "display_option")]
    pub booked_date: Option<NaiveDate>,
    #[tabled(display_with = "display_option")]
    pub estimated_delivery_date: Option<NaiveDate>,
    #[tabled(display_with = "display_option")]
    pub delivered_date: Option<NaiveDate>,
    #[tabled(display_with = "display_option")]
    pub delivery_duration_days: Option<i64>,
    #[tabled(display_with = "display_option")]
    pub delivery_delay_days: Option<i64>,
    pub is_delayed: bool,
}

/// One row of the customer reference file. Extra columns in the file are
/// ignored; only the key and display name feed the mart.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerRow {
    pub customer_id: String,
    pub customer_name: String,
}

/// One row of the monthly performance mart: one record per
/// `(customer_id, customer_name, month_year)` group.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct MartRow {
    pub customer_id: String,
    /// `None` when the shipment had no match in the customer reference.
    #[tabled(display_with = "display_option")]
    pub customer_name: Option<String>,
    /// Calendar month of `booked_date` as `YYYY-MM`; `None` when the booked
    /// date was unparseable.
    #[tabled(display_with = "display_option")]
    pub month_year: Option<String>,
    pub total_shipments: usize,
    pub delivered_shipments: usize,
    pub on_process_shipments: usize,
    pub cancelled_shipments: usize,
    /// Mean `delivery_duration_days` over the group's delivered rows; `None`
    /// when the group has none.
    #[tabled(display_with = "display_option")]
    pub avg_delivery_days: Option<f64>,
    pub delayed_shipments: usize,
    /// `delayed_shipments / delivered_shipments`, forced to 0 for groups with
    /// no delivered shipments.
    pub delayed_rate: f64,
}
