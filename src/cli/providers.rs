use super::ui;
use crate::core::config::ProvidersConfig;
use comfy_table::{Cell, Table};

/// Prints the configured providers in merge order.
pub fn run(config: &ProvidersConfig) {
    println!(
        "\n{}",
        ui::style_text("Rate providers", ui::StyleType::Title)
    );
    println!("{}", providers_table(config));
}

fn providers_table(config: &ProvidersConfig) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Provider"),
        ui::header_cell("Source"),
        ui::header_cell("Endpoint"),
    ]);

    let disabled = |table: &mut Table, name: &str| {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(ui::style_text("disabled", ui::StyleType::Subtle)),
            Cell::new(""),
        ]);
    };

    match &config.bcv {
        Some(bcv) => {
            for source in &bcv.sources {
                table.add_row(vec![Cell::new("BCV"), Cell::new(&source.name), Cell::new(&source.url)]);
            }
        }
        None => disabled(&mut table, "BCV"),
    }

    match &config.frankfurter {
        Some(frankfurter) => {
            table.add_row(vec![
                Cell::new("Frankfurter"),
                Cell::new("ECB reference rates"),
                Cell::new(&frankfurter.base_url),
            ]);
        }
        None => disabled(&mut table, "Frankfurter"),
    }

    match &config.public_fx {
        Some(public_fx) => {
            for source in &public_fx.sources {
                let name = if source.requires_key && public_fx.api_key.is_none() {
                    format!("{} (skipped: no API key)", source.name)
                } else {
                    source.name.clone()
                };
                table.add_row(vec![Cell::new("PublicFX"), Cell::new(name), Cell::new(&source.url)]);
            }
        }
        None => disabled(&mut table, "PublicFX"),
    }
    table
}
