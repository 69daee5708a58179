//! Tax year commands - which year a date falls in, and the year picker list

use super::{format_gbp, Context};
use chrono::NaiveDate;
use clap::Args;
use finnest::core::{available_tax_years_at, TaxYear, DEFAULT_YEARS_BACK, DEFAULT_YEARS_FORWARD};
use serde::Serialize;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct TaxYearCommand {
    /// Date to look up (YYYY-MM-DD). Defaults to today.
    date: Option<NaiveDate>,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaxYearOutput {
    date: NaiveDate,
    tax_year: TaxYear,
    relative_label: String,
    days_remaining: i64,
}

impl TaxYearCommand {
    pub fn exec(&self, ctx: &Context) -> anyhow::Result<()> {
        let date = self.date.unwrap_or(ctx.today);
        let tax_year = TaxYear::containing(date);
        let output = TaxYearOutput {
            date,
            tax_year,
            relative_label: tax_year.relative_label_at(ctx.today),
            days_remaining: tax_year.days_remaining_at(date),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!("{} falls in tax year {}", date, output.relative_label);
        println!(
            "  Runs {} to {}",
            tax_year.start_date().format("%-d %B %Y"),
            tax_year.end_date().format("%-d %B %Y")
        );
        println!("  ISA allowance {}", format_gbp(tax_year.isa_allowance()));
        if output.days_remaining >= 0 {
            println!("  {} days until the ISA deadline", output.days_remaining);
        }
        Ok(())
    }
}

/// Upper bound for `--back`/`--forward`
const MAX_LISTED_YEARS: i64 = 1000;

#[derive(Args, Debug)]
pub struct YearsCommand {
    /// Number of past tax years to list
    #[arg(short, long, default_value_t = DEFAULT_YEARS_BACK, value_parser = clap::value_parser!(u32).range(..=MAX_LISTED_YEARS))]
    back: u32,

    /// Number of future tax years to list
    #[arg(short, long, default_value_t = DEFAULT_YEARS_FORWARD, value_parser = clap::value_parser!(u32).range(..=MAX_LISTED_YEARS))]
    forward: u32,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Tabled)]
struct YearRow {
    #[tabled(rename = "Tax Year")]
    label: String,
    #[tabled(rename = "Starts")]
    start: String,
    #[tabled(rename = "Ends")]
    end: String,
    #[tabled(rename = "ISA Allowance")]
    allowance: String,
}

impl YearsCommand {
    pub fn exec(&self, ctx: &Context) -> anyhow::Result<()> {
        let years = available_tax_years_at(ctx.today, self.back, self.forward);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&years)?);
            return Ok(());
        }

        let rows: Vec<YearRow> = years
            .iter()
            .map(|ty| YearRow {
                label: ty.relative_label_at(ctx.today),
                start: ty.start_date().format("%Y-%m-%d").to_string(),
                end: ty.end_date().format("%Y-%m-%d").to_string(),
                allowance: format_gbp(ty.isa_allowance()),
            })
            .collect();

        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
        Ok(())
    }
}
