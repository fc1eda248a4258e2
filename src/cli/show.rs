use super::ui;
use crate::error::RateError;
use crate::rates::{Currency, DailyRate};
use crate::resolver::RateResolver;
use anyhow::{Context, Result};
use comfy_table::Cell;

/// Most recent trading days shown in the table.
const DISPLAY_DAYS: usize = 15;

pub async fn run(
    resolver: &RateResolver,
    from: Currency,
    to: Currency,
    refresh: bool,
) -> Result<()> {
    let rates = match resolver.resolve_pair(from, to, refresh).await {
        Ok(rates) => rates,
        Err(RateError::BudgetExceeded) => {
            println!(
                "{}",
                ui::style_text(
                    "Daily provider call budget exhausted, try again tomorrow.",
                    ui::StyleType::Error
                )
            );
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to resolve {from}/{to}")),
    };

    if rates.is_empty() {
        println!(
            "No data for {from}/{to}. Run {} to populate the cache.",
            ui::style_text("fxdash refresh", ui::StyleType::Subtle)
        );
        return Ok(());
    }

    println!(
        "Pair: {}\n",
        ui::style_text(&format!("{from}/{to}"), ui::StyleType::Title)
    );
    println!("{}", series_table(&rates));

    let first = rates.first().map(|r| r.date).unwrap_or_default();
    let last = rates.last().map(|r| r.date).unwrap_or_default();
    println!(
        "\n{} trading days, {first} to {last}",
        ui::style_text(&rates.len().to_string(), ui::StyleType::Success)
    );
    Ok(())
}

fn series_table(rates: &[DailyRate]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Open"),
        ui::header_cell("High"),
        ui::header_cell("Low"),
        ui::header_cell("Close"),
        ui::header_cell("Change"),
    ]);

    let tail_start = rates.len().saturating_sub(DISPLAY_DAYS);
    for (i, rate) in rates.iter().enumerate().skip(tail_start) {
        let change = i
            .checked_sub(1)
            .and_then(|prev| rates.get(prev))
            .filter(|prev| prev.close != 0.0)
            .map(|prev| ((rate.close - prev.close) / prev.close) * 100.0);

        let change_cell = match change {
            Some(c) => ui::change_cell(c),
            None => Cell::new("-"),
        };
        table.add_row(vec![
            Cell::new(rate.date.to_string()),
            ui::rate_cell(rate.open),
            ui::rate_cell(rate.high),
            ui::rate_cell(rate.low),
            ui::rate_cell(rate.close),
            change_cell,
        ]);
    }
    table.to_string()
}
