// Entry point and high-level CLI flow.
//
// Two batch stages over fixed file paths:
// - Option [1] cleans the raw shipment CSV, prints data-quality diagnostics,
//   and writes the cleaned transaction dataset plus a JSON quality report.
// - Option [2] joins the cleaned dataset with the customer reference and
//   writes the monthly per-customer performance mart.
// - After building the mart, the user can choose to go back to the
//   selection menu or exit.
mod mart;
mod output;
mod transform;
mod types;
mod util;

use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::sync::Mutex;
use types::CleanShipment;

const RAW_SHIPMENTS_PATH: &str = "shipments_raw.csv";
const CUSTOMERS_PATH: &str = "customers_raw.csv";
const CLEAN_OUTPUT_PATH: &str = "shipment_transformed.csv";
const MART_OUTPUT_PATH: &str = "shipment_performance.csv";
const QUALITY_REPORT_PATH: &str = "quality_report.json";

/// Column count of the cleaned dataset, for the shape diagnostic.
const CLEAN_COLUMNS: usize = 9;

// Simple in-memory app state so the cleaned dataset can feed the mart stage
// without a re-read when both run in the same session.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState { clean: None }));

struct AppState {
    clean: Option<Vec<CleanShipment>>,
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Ask the user whether to go back to the stage selection menu.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Stage Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        io::stdin().read_line(&mut buf).ok();
        let resp = buf.trim().to_uppercase();
        match resp.as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Handle option [1]: clean the raw shipment file.
///
/// On success the cleaned rows are cached in `APP_STATE`, written to
/// `shipment_transformed.csv`, and the quality counts are printed and saved
/// to `quality_report.json`.
fn handle_transform() {
    let (clean, report) = match transform::load_and_clean(RAW_SHIPMENTS_PATH) {
        Ok(res) => res,
        Err(e) => {
            eprintln!("Failed to transform {}: {}\n", RAW_SHIPMENTS_PATH, e);
            return;
        }
    };

    println!(
        "Processing dataset... ({} rows loaded)",
        util::format_int(report.total_rows as i64)
    );
    if report.deserialize_errors > 0 {
        println!(
            "Note: {} rows skipped due to malformed CSV records.",
            util::format_int(report.deserialize_errors as i64)
        );
    }
    if report.duplicates_removed > 0 {
        println!(
            "Note: {} exact duplicate rows removed.",
            util::format_int(report.duplicates_removed as i64)
        );
    }

    println!("\nData quality check for delivered_date:");
    for (status, missing) in &report.missing_delivered_date_by_status {
        println!("  {}: {} missing", status, util::format_int(*missing as i64));
    }
    if report.dropped_missing_delivered_date > 0 {
        println!(
            "Dropping {} delivered rows without delivered_date",
            util::format_int(report.dropped_missing_delivered_date as i64)
        );
    }
    println!(
        "Removing {} invalid delivery_duration_days rows",
        util::format_int(report.dropped_negative_duration as i64)
    );

    if let Err(e) = output::write_csv(CLEAN_OUTPUT_PATH, &clean) {
        eprintln!("Write error: {}", e);
        return;
    }
    if let Err(e) = output::write_json(QUALITY_REPORT_PATH, &report) {
        eprintln!("Write error: {}", e);
    }

    println!("\nCleaned dataset preview:");
    output::preview_table_rows(&clean, 3);
    println!("{} created successfully.", CLEAN_OUTPUT_PATH);
    println!(
        "Final dataset shape: ({} rows, {} columns)\n",
        util::format_int(report.output_rows as i64),
        CLEAN_COLUMNS
    );

    let mut state = APP_STATE.lock().unwrap();
    state.clean = Some(clean);
}

/// Handle option [2]: build the monthly performance mart.
///
/// Uses the cleaned rows cached by option [1] when available; otherwise
/// re-reads the intermediate file, so the stages can also run in separate
/// sessions.
fn handle_build_mart() {
    let cached = {
        let state = APP_STATE.lock().unwrap();
        state.clean.clone()
    };
    let clean = match cached {
        Some(rows) => rows,
        None => match mart::load_clean(CLEAN_OUTPUT_PATH) {
            Ok(rows) => rows,
            Err(e) => {
                eprintln!(
                    "Failed to load {}: {} (run option 1 first)\n",
                    CLEAN_OUTPUT_PATH, e
                );
                return;
            }
        },
    };
    let customers = match mart::load_customers(CUSTOMERS_PATH) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("Failed to load {}: {}\n", CUSTOMERS_PATH, e);
            return;
        }
    };

    println!("Building monthly performance mart...");
    let rows = mart::build_mart(&clean, &customers);
    if let Err(e) = output::write_csv(MART_OUTPUT_PATH, &rows) {
        eprintln!("Write error: {}", e);
        return;
    }

    println!("\nMart preview (customer x month):");
    output::preview_table_rows(&rows, 3);
    println!(
        "{} created ({} groups)\n",
        MART_OUTPUT_PATH,
        util::format_int(rows.len() as i64)
    );
}

fn main() {
    loop {
        println!("Select Pipeline Stage:");
        println!("[1] Transform raw shipments");
        println!("[2] Build performance mart\n");
        match read_choice().as_str() {
            "1" => {
                handle_transform();
            }
            "2" => {
                println!("");
                handle_build_mart();
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => {
                println!("Invalid choice. Please enter 1 or 2.\n");
            }
        }
    }
}
