use anyhow::Context;
use serde::Serialize;
use specstack_core::branch::Branch;
use specstack_core::contract::ContractEnvelope;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// A branch record as JSON, with its name included.
pub fn branch_json(branch: &Branch) -> anyhow::Result<serde_json::Value> {
    let mut value = serde_json::to_value(branch)?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert("name".to_string(), serde_json::Value::from(branch.name.clone()));
    }
    Ok(value)
}

/// Write the envelope as one line on stderr and return its exit code.
pub fn emit_envelope(envelope: &ContractEnvelope) -> anyhow::Result<i32> {
    let line = envelope
        .to_line()
        .context("failed to serialize contract envelope")?;
    eprintln!("{line}");
    Ok(envelope.exit_code())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  ").trim_end());

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}

/// `-` for absent optional cells.
pub fn or_dash(value: Option<impl ToString>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}
