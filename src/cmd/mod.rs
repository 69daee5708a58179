pub mod allowance;
pub mod reminders;
pub mod schema;
pub mod settings;
pub mod tax_year;

use anyhow::Context as _;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use finnest::core::{contributions, Contribution, FileStore, IsaSettings, TaxYear};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Options shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub data_dir: PathBuf,
    pub today: NaiveDate,
    /// Wall-clock now, or midnight of an overridden `today`
    pub now: NaiveDateTime,
}

impl Context {
    pub fn new(data_dir: Option<PathBuf>, today: Option<NaiveDate>) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let now = match today {
            Some(date) => date.and_time(NaiveTime::MIN),
            None => Local::now().naive_local(),
        };
        let today = now.date();
        log::debug!("Using data dir {} (today {})", data_dir.display(), today);
        Context {
            data_dir,
            today,
            now,
        }
    }

    pub fn settings(&self) -> IsaSettings<FileStore> {
        IsaSettings::new(FileStore::new(&self.data_dir))
    }

    pub fn current_tax_year(&self) -> TaxYear {
        TaxYear::current_at(self.today)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("finnest"))
        .unwrap_or_else(|| PathBuf::from(".finnest"))
}

/// Read contributions from a CSV or JSON file (or stdin with "-")
pub fn read_contributions(path: &Path) -> anyhow::Result<Vec<Contribution>> {
    if path.as_os_str() == "-" {
        return read_from_stdin();
    }
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let contributions = if is_json {
        contributions::read_json(reader)
    } else {
        contributions::read_csv(reader)
    }
    .with_context(|| format!("reading {}", path.display()))?;
    log::info!("Read {} contributions", contributions.len());
    Ok(contributions)
}

fn read_from_stdin() -> anyhow::Result<Vec<Contribution>> {
    let mut buffer = Vec::new();
    io::stdin().lock().read_to_end(&mut buffer)?;

    if buffer.iter().all(u8::is_ascii_whitespace) {
        anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
    }

    // JSON input is an object, CSV starts with a header row
    let is_json = buffer
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'{');
    let contributions = if is_json {
        contributions::read_json(buffer.as_slice())?
    } else {
        contributions::read_csv(buffer.as_slice())?
    };
    Ok(contributions)
}

pub fn format_gbp(amount: rust_decimal::Decimal) -> String {
    format!("£{:.2}", amount)
}
