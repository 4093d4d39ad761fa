//! snapshot subcommand - print snapshot attributes

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use serde_json::{Map, Value};

use tngfetch_api::{Client, Snapshot};

use crate::config::Settings;

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Simulation name (e.g. TNG50-1)
    pub simulation: String,

    /// Snapshot number
    pub snapshot: u32,

    /// Print raw JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

fn scalar(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

/// Two-column table of a JSON object's attributes.
pub(super) fn format_table(attributes: &Map<String, Value>) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Attribute").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    for (key, value) in attributes {
        table.add_row(vec![Cell::new(key), Cell::new(scalar(value))]);
    }
    table.to_string()
}

fn headline(simulation: &str, snap: &Snapshot) -> String {
    let number = snap
        .number()
        .map_or_else(|| "?".to_string(), |n| n.to_string());
    let redshift = snap
        .redshift()
        .map_or_else(|| "?".to_string(), |z| format!("{:.2}", z.abs()));
    match snap.subhalo_count() {
        Some(n) => format!("{simulation} snapshot {number} at z={redshift}: {n} subhalos"),
        None => format!("{simulation} snapshot {number} at z={redshift}"),
    }
}

pub fn run(args: SnapshotArgs, settings: &Settings) -> Result<()> {
    let client = Client::new(settings.base_url(), settings.api_key());
    let snap = client
        .resolve(&args.simulation, args.snapshot)
        .with_context(|| format!("Cannot resolve {}/{}", args.simulation, args.snapshot))?;

    if args.json {
        let body = serde_json::to_string_pretty(&Value::Object(snap.attributes.clone()))?;
        println!("{body}");
    } else {
        println!("{}", format_table(&snap.attributes));
        log::info!("{}", headline(&args.simulation, &snap));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_lists_attributes() {
        let Value::Object(attrs) = json!({
            "number": 99,
            "redshift": 0.0,
            "num_groups_subfind": 2500,
            "url": "http://x/",
            "files": null,
        }) else {
            unreachable!()
        };
        let t = format_table(&attrs);
        assert!(t.contains("num_groups_subfind"));
        assert!(t.contains("2500"));
        assert!(t.contains("http://x/"));
    }

    #[test]
    fn headline_shows_number_redshift_and_count() {
        let Value::Object(attrs) = json!({
            "number": 99,
            "redshift": 2.2e-16,
            "num_groups_subfind": 2500,
        }) else {
            unreachable!()
        };
        let snap = Snapshot::new(attrs, "http://x/");
        assert_eq!(
            headline("TNG50-1", &snap),
            "TNG50-1 snapshot 99 at z=0.00: 2500 subhalos"
        );
    }

    #[test]
    fn headline_tolerates_missing_attributes() {
        let snap = Snapshot::new(Map::new(), "http://x/");
        assert_eq!(headline("TNG50-1", &snap), "TNG50-1 snapshot ? at z=?");
    }

    #[test]
    fn scalars_render_without_quotes() {
        assert_eq!(scalar(&json!("abc")), "abc");
        assert_eq!(scalar(&json!(1.5)), "1.5");
        assert_eq!(scalar(&Value::Null), "-");
    }
}
