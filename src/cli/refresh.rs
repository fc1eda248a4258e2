use super::ui;
use crate::sync::SyncOrchestrator;
use anyhow::{Context, Result};

/// User-triggered "refresh all": forces every supported pair through the
/// rate provider with a progress bar.
pub async fn run_refresh(orchestrator: &SyncOrchestrator) -> Result<()> {
    let pb = ui::new_progress_bar(0, true);
    pb.set_message("Refreshing rates...");

    let report = orchestrator
        .refresh_all(|current, total, currency| {
            if pb.length() == Some(0) {
                pb.set_length(total as u64);
            }
            pb.set_message(format!("Refreshed {currency}"));
            pb.set_position(current as u64);
        })
        .await;
    pb.finish_and_clear();

    if report.already_current {
        println!(
            "{}",
            ui::style_text("All pairs already refreshed today.", ui::StyleType::Subtle)
        );
        return Ok(());
    }

    println!(
        "Refreshed {} pairs ({} records).",
        ui::style_text(&report.refreshed.to_string(), ui::StyleType::Success),
        report.records
    );
    for (currency, reason) in &report.failed {
        println!(
            "  {} {currency}: {reason}",
            ui::style_text("failed", ui::StyleType::Error)
        );
    }
    Ok(())
}

/// Warms the local cache from the backend store. The sync itself runs as a
/// detached task; the command waits for its completion report before
/// printing it.
pub async fn run_sync(orchestrator: &SyncOrchestrator) -> Result<()> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    orchestrator.spawn_background_sync(move |report| {
        let _ = tx.send(report);
    });

    let report = rx.await.context("Background sync task dropped")?;
    println!(
        "Synced {} pairs from backend ({} records), {} already cached, {} unavailable.",
        ui::style_text(&report.synced.to_string(), ui::StyleType::Success),
        report.records,
        report.skipped,
        report.failed
    );
    Ok(())
}
