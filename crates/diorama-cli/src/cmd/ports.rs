use anyhow::{Context, Result};
use diorama_core::serial::available_ports;

use crate::output::{print_json, print_table};

pub fn run(json: bool) -> Result<()> {
    let ports = available_ports().context("failed to enumerate serial ports")?;

    if json {
        return print_json(&ports);
    }
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }
    let rows = ports
        .into_iter()
        .map(|p| vec![p.name, p.description])
        .collect();
    print_table(&["PORT", "DESCRIPTION"], rows);
    Ok(())
}
