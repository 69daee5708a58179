use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser, Debug)]
#[command(name = "finnest", version, about = "Track UK ISA allowances, tax years and flexible-ISA settings")]
struct Opts {
    /// Directory holding local settings
    #[arg(long, global = true, env = "FINNEST_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Treat this date as today (YYYY-MM-DD)
    #[arg(long, global = true, env = "FINNEST_TODAY")]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the tax year a date falls in
    TaxYear(cmd::tax_year::TaxYearCommand),
    /// List tax years around the current one
    Years(cmd::tax_year::YearsCommand),
    /// Manage flexible-ISA settings
    Settings(cmd::settings::SettingsCommand),
    /// Report ISA allowance usage from a contributions file
    Allowance(cmd::allowance::AllowanceCommand),
    /// Plan ISA deadline reminders
    Reminders(cmd::reminders::RemindersCommand),
    /// Print expected input formats
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let opts = Opts::parse();
    let ctx = cmd::Context::new(opts.data_dir, opts.today);

    match opts.command {
        Command::TaxYear(command) => command.exec(&ctx),
        Command::Years(command) => command.exec(&ctx),
        Command::Settings(command) => command.exec(&ctx),
        Command::Allowance(command) => command.exec(&ctx),
        Command::Reminders(command) => command.exec(&ctx),
        Command::Schema(command) => command.exec(),
    }
}
