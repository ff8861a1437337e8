use super::ui;
use crate::core::format::format_rate;
use crate::core::{Composer, RatesResponse};
use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

pub async fn run(composer: &Composer, json: bool) -> Result<()> {
    let pb = ui::new_spinner("Fetching rates");
    let response = composer.compose_rates().await;
    pb.finish_and_clear();
    let response = response.context("Failed to compose rates")?;

    if json {
        let body = serde_json::to_string_pretty(&response).context("Failed to serialize rates")?;
        println!("{body}");
        return Ok(());
    }

    println!(
        "\n{}",
        ui::style_text(
            &format!("Rates at {}", response.at.format("%Y-%m-%d %H:%M:%S UTC")),
            ui::StyleType::Title
        )
    );
    println!("{}", rates_table(&response));

    ui::print_separator();
    println!("{}", ui::style_text("Provider notes", ui::StyleType::TotalLabel));
    for note in &response.provider_notes {
        println!("  {}", styled_note(note));
    }
    Ok(())
}

fn rates_table(response: &RatesResponse) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Pair"),
        ui::header_cell("Rate"),
        ui::header_cell("Provider"),
        ui::header_cell("Updated"),
    ]);

    for (key, rate) in response.rates.iter() {
        table.add_row(vec![
            Cell::new(key.to_string()),
            ui::number_cell(format_rate(rate.value(), rate.base(), rate.quote())),
            Cell::new(rate.provider()),
            Cell::new(rate.at().format("%Y-%m-%d %H:%M").to_string()),
        ]);
    }
    table
}

fn styled_note(note: &str) -> String {
    if note.contains(": Failed") {
        ui::style_text(note, ui::StyleType::Error)
    } else {
        ui::style_text(note, ui::StyleType::Subtle)
    }
}
