//! Schema command - print expected input and storage formats

use clap::Args;
use finnest::core::{ContributionInput, SettingsMap};
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format
    #[arg(value_enum, default_value = "json-schema")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for the contributions input
    JsonSchema,
    /// CSV header row for the contributions input
    CsvHeader,
    /// CSV column descriptions
    CsvFields,
    /// JSON Schema for the stored ISA settings blob
    Settings,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::JsonSchema => {
                let schema = schema_for!(ContributionInput);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::CsvHeader => {
                let names: Vec<&str> = CSV_FIELDS.iter().map(|(name, _, _)| *name).collect();
                println!("{}", names.join(","));
            }
            SchemaFormat::CsvFields => {
                println!("CSV Input Format");
                println!("================");
                println!();
                for (name, required, description) in CSV_FIELDS {
                    let req = if *required { "required" } else { "optional" };
                    println!("{:12} ({:8})  {}", name, req, description);
                }
            }
            SchemaFormat::Settings => {
                let schema = schema_for!(SettingsMap);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
        }
        Ok(())
    }
}

const CSV_FIELDS: &[(&str, bool, &str)] = &[
    ("date", true, "Date the money moved (YYYY-MM-DD)"),
    ("provider", true, "Provider name, e.g. Vanguard"),
    ("isa_type", true, "cash, stocks_shares, lifetime, innovative_finance or junior"),
    ("amount", true, "Amount in GBP, positive"),
    ("kind", false, "deposit (default) or withdrawal"),
    ("description", false, "Free text"),
];
