//! Allowance command - how much of a tax year's ISA allowance is used

use super::{format_gbp, read_contributions, Context};
use clap::Args;
use finnest::core::{allowance_report, AllowanceReport, TaxYear, Warning};
use std::path::PathBuf;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct AllowanceCommand {
    /// Contributions file (CSV or JSON). Reads from stdin if not specified.
    #[arg(default_value = "-")]
    file: PathBuf,

    /// Tax year to report (e.g. 2025/26). Defaults to the current tax year.
    #[arg(short, long)]
    year: Option<TaxYear>,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Tabled)]
struct AccountRow {
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "ISA Type")]
    isa_type: String,
    #[tabled(rename = "Flexible")]
    flexible: String,
    #[tabled(rename = "Deposited")]
    deposited: String,
    #[tabled(rename = "Withdrawn")]
    withdrawn: String,
    #[tabled(rename = "Counted")]
    counted: String,
}

impl AllowanceCommand {
    pub fn exec(&self, ctx: &Context) -> anyhow::Result<()> {
        let tax_year = self.year.unwrap_or_else(|| ctx.current_tax_year());
        let contributions = read_contributions(&self.file)?;
        let settings = ctx.settings();
        let report = allowance_report(&contributions, tax_year, |provider, isa_type| {
            settings.is_flexible(provider, isa_type)
        });

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report, ctx);
        }
        Ok(())
    }
}

fn print_report(report: &AllowanceReport, ctx: &Context) {
    println!();
    println!("ISA ALLOWANCE ({})", report.tax_year.relative_label_at(ctx.today));
    println!();

    if report.accounts.is_empty() {
        println!("No contributions in this tax year");
    } else {
        let rows: Vec<AccountRow> = report
            .accounts
            .iter()
            .map(|a| AccountRow {
                provider: a.provider.clone(),
                isa_type: a.isa_type.clone(),
                flexible: if a.flexible { "yes" } else { "no" }.to_string(),
                deposited: format_gbp(a.deposited),
                withdrawn: format_gbp(a.withdrawn),
                counted: format_gbp(a.counted),
            })
            .collect();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(3..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
    }

    println!();
    println!("Allowance:   {:>12}", format_gbp(report.allowance));
    println!("Subscribed:  {:>12}", format_gbp(report.subscribed));
    println!("Remaining:   {:>12}", format_gbp(report.remaining));
    if report.lifetime_subscribed > rust_decimal::Decimal::ZERO {
        println!(
            "Lifetime ISA: {} of {}",
            format_gbp(report.lifetime_subscribed),
            format_gbp(report.lifetime_allowance)
        );
    }
    if report.junior_subscribed > rust_decimal::Decimal::ZERO {
        println!(
            "Junior ISA:   {} of {}",
            format_gbp(report.junior_subscribed),
            format_gbp(report.junior_allowance)
        );
    }

    for warning in &report.warnings {
        println!("WARNING: {}", warning_message(warning));
    }
}

fn warning_message(warning: &Warning) -> String {
    match warning {
        Warning::AllowanceExceeded { excess } => {
            format!("ISA allowance exceeded by {}", format_gbp(*excess))
        }
        Warning::LifetimeLimitExceeded { excess } => {
            format!("Lifetime ISA limit exceeded by {}", format_gbp(*excess))
        }
        Warning::JuniorLimitExceeded { excess } => {
            format!("Junior ISA limit exceeded by {}", format_gbp(*excess))
        }
    }
}
