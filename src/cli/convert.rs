use super::ui;
use crate::core::format::{format_amount, format_rate};
use crate::core::{Composer, Currency, RateGraph, convert, resolve};
use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

pub async fn run(composer: &Composer, amount: f64, from: Currency, to: &[Currency]) -> Result<()> {
    if !amount.is_finite() {
        anyhow::bail!("Amount must be a finite number, got {amount}");
    }

    let pb = ui::new_spinner("Fetching rates");
    let response = composer.compose_rates().await;
    pb.finish_and_clear();
    let response = response.context("Failed to compose rates")?;

    let targets = target_currencies(from, to);
    println!(
        "\n{}",
        ui::style_text(&format_amount(amount, from), ui::StyleType::Title)
    );
    println!("{}", conversion_table(amount, from, &targets, &response.rates));
    Ok(())
}

/// Every other supported currency when no target is given.
fn target_currencies(from: Currency, to: &[Currency]) -> Vec<Currency> {
    if to.is_empty() {
        Currency::ALL.into_iter().filter(|c| *c != from).collect()
    } else {
        to.to_vec()
    }
}

fn conversion_table(amount: f64, from: Currency, targets: &[Currency], graph: &RateGraph) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("To"),
        ui::header_cell("Amount"),
        ui::header_cell("Rate"),
        ui::header_cell("Route"),
    ]);

    for &target in targets {
        let row = match (resolve(from, target, graph), convert(amount, from, target, graph)) {
            (Some(route), Some(converted)) => vec![
                Cell::new(target.code()),
                ui::result_cell(format_amount(converted, target)),
                ui::number_cell(format_rate(route.effective_rate(), from, target)),
                Cell::new(format!("{} ({})", route.path(), route.kind)),
            ],
            _ => vec![
                Cell::new(target.code()),
                ui::na_cell(true),
                ui::na_cell(false),
                Cell::new(ui::style_text("rate unavailable", ui::StyleType::Error)),
            ],
        };
        table.add_row(row);
    }
    table
}
