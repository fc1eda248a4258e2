use super::ui;
use crate::providers::backend::BackendClient;
use crate::store::RateStore;
use anyhow::Result;
use comfy_table::Cell;
use std::sync::Arc;

pub async fn run(backend: Option<&BackendClient>, store: &Arc<dyn RateStore>) -> Result<()> {
    match backend {
        Some(backend) if backend.is_available().await => {
            let coverage = backend.status().await?;
            println!(
                "Backend store: {}\n",
                ui::style_text("available", ui::StyleType::Success)
            );

            let mut table = ui::new_styled_table();
            table.set_header(vec![
                ui::header_cell("Pair"),
                ui::header_cell("Rows"),
                ui::header_cell("Earliest"),
                ui::header_cell("Latest"),
            ]);
            for entry in coverage {
                table.add_row(vec![
                    Cell::new(format!("{}/{}", entry.from_currency, entry.to_currency)),
                    Cell::new(entry.count.to_string()),
                    Cell::new(opt_date(entry.earliest)),
                    Cell::new(opt_date(entry.latest)),
                ]);
            }
            println!("{table}");
        }
        Some(_) => println!(
            "Backend store: {}",
            ui::style_text("unreachable", ui::StyleType::Error)
        ),
        None => println!(
            "Backend store: {}",
            ui::style_text("not configured", ui::StyleType::Subtle)
        ),
    }

    let mut cached = store.list_all().await;
    cached.sort_by_key(|s| s.pair.key());
    if cached.is_empty() {
        println!("\nLocal cache is empty.");
        return Ok(());
    }

    println!(
        "\nLocal cache: {} pairs\n",
        ui::style_text(&cached.len().to_string(), ui::StyleType::Success)
    );
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Pair"),
        ui::header_cell("Records"),
        ui::header_cell("Last updated"),
    ]);
    for series in cached {
        table.add_row(vec![
            Cell::new(series.pair.key()),
            Cell::new(series.rates.len().to_string()),
            Cell::new(series.last_updated.format("%Y-%m-%d %H:%M UTC").to_string()),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn opt_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}
