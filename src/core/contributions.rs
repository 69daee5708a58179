//! ISA subscriptions and how much of a tax year's allowance they use

use super::settings::derive_key;
use super::tax_year::TaxYear;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

#[derive(Debug, thiserror::Error)]
pub enum ContributionError {
    #[error("invalid contributions csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid contributions json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("contribution on {date} to {provider} must have a positive amount, got {amount}")]
    NonPositiveAmount {
        date: NaiveDate,
        provider: String,
        amount: Decimal,
    },
}

/// JSON input root
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContributionInput {
    pub contributions: Vec<Contribution>,
}

/// Money paid into (or taken out of) one ISA account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Contribution {
    /// Date the money moved (YYYY-MM-DD)
    pub date: NaiveDate,
    /// Provider name, e.g. "Vanguard"
    pub provider: String,
    /// Account type, e.g. "cash", "stocks_shares", "lifetime", "junior"
    pub isa_type: String,
    /// Amount in GBP, always positive
    #[schemars(with = "f64")]
    pub amount: Decimal,
    /// deposit (default) or withdrawal
    #[serde(default, deserialize_with = "deposit_if_blank")]
    #[schemars(with = "Option<ContributionKind>")]
    pub kind: ContributionKind,
    #[serde(default)]
    pub description: Option<String>,
}

impl Contribution {
    pub fn tax_year(&self) -> TaxYear {
        TaxYear::containing(self.date)
    }

    pub fn isa_kind(&self) -> IsaType {
        IsaType::classify(&self.isa_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContributionKind {
    #[default]
    Deposit,
    Withdrawal,
}

/// A blank CSV cell (or JSON null) means a deposit
fn deposit_if_blank<'de, D>(deserializer: D) -> Result<ContributionKind, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<ContributionKind>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Account types with their own allowance treatment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IsaType {
    Cash,
    StocksShares,
    Lifetime,
    InnovativeFinance,
    /// Has its own allowance, separate from the adult limit
    Junior,
    Other,
}

impl IsaType {
    /// Classify a free-form account type such as "Cash ISA" or "stocks-and-shares"
    pub fn classify(raw: &str) -> IsaType {
        let normalized = raw
            .trim()
            .to_lowercase()
            .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_");
        let normalized = normalized.strip_suffix("_isa").unwrap_or(&normalized);

        match normalized {
            "cash" => IsaType::Cash,
            "stocks_shares" | "stocks_and_shares" | "stocks_&_shares" | "s&s" | "stocks" => {
                IsaType::StocksShares
            }
            "lifetime" | "lisa" => IsaType::Lifetime,
            "innovative_finance" | "ifisa" | "if" => IsaType::InnovativeFinance,
            "junior" | "jisa" | "junior_cash" | "junior_stocks_shares" => IsaType::Junior,
            _ => IsaType::Other,
        }
    }
}

/// Read contributions from CSV, sorted by date
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Contribution>, ContributionError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let records: Result<Vec<Contribution>, _> = rdr.deserialize::<Contribution>().collect();
    validate(records?)
}

/// Read contributions from JSON (`{"contributions": [...]}`), sorted by date
pub fn read_json<R: Read>(reader: R) -> Result<Vec<Contribution>, ContributionError> {
    let input: ContributionInput = serde_json::from_reader(reader)?;
    validate(input.contributions)
}

fn validate(mut contributions: Vec<Contribution>) -> Result<Vec<Contribution>, ContributionError> {
    if let Some(bad) = contributions.iter().find(|c| c.amount <= Decimal::ZERO) {
        return Err(ContributionError::NonPositiveAmount {
            date: bad.date,
            provider: bad.provider.clone(),
            amount: bad.amount,
        });
    }
    contributions.sort_by_key(|c| c.date);
    Ok(contributions)
}

/// Allowance usage for one tax year
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowanceReport {
    pub tax_year: TaxYear,
    pub allowance: Decimal,
    /// Subscriptions counted against the adult allowance
    pub subscribed: Decimal,
    pub remaining: Decimal,
    pub lifetime_allowance: Decimal,
    pub lifetime_subscribed: Decimal,
    pub junior_allowance: Decimal,
    pub junior_subscribed: Decimal,
    /// Ordered by provider, then ISA type
    pub accounts: Vec<AccountSummary>,
    pub warnings: Vec<Warning>,
}

impl AllowanceReport {
    pub fn exceeded(&self) -> bool {
        self.subscribed > self.allowance
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub provider: String,
    pub isa_type: String,
    pub kind: IsaType,
    pub flexible: bool,
    pub deposited: Decimal,
    pub withdrawn: Decimal,
    /// Amount counted against the allowance after flexible replacement
    pub counted: Decimal,
}

impl AccountSummary {
    fn new(contribution: &Contribution, flexible: bool) -> Self {
        AccountSummary {
            provider: contribution.provider.clone(),
            isa_type: contribution.isa_type.clone(),
            kind: contribution.isa_kind(),
            flexible,
            deposited: Decimal::ZERO,
            withdrawn: Decimal::ZERO,
            counted: Decimal::ZERO,
        }
    }

    fn apply(&mut self, contribution: &Contribution) {
        match contribution.kind {
            ContributionKind::Deposit => {
                self.deposited += contribution.amount;
                self.counted += contribution.amount;
            }
            ContributionKind::Withdrawal => {
                self.withdrawn += contribution.amount;
                // only flexible accounts get replacement allowance back
                if self.flexible {
                    self.counted = (self.counted - contribution.amount).max(Decimal::ZERO);
                }
            }
        }
    }
}

/// Limits broken in the reported tax year
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Warning {
    AllowanceExceeded { excess: Decimal },
    LifetimeLimitExceeded { excess: Decimal },
    JuniorLimitExceeded { excess: Decimal },
}

/// Work out how much of `tax_year`'s allowance the contributions use.
///
/// `is_flexible` reports whether a (provider, ISA type) account is a flexible
/// ISA, normally `IsaSettings::is_flexible`.
pub fn allowance_report<F>(contributions: &[Contribution], tax_year: TaxYear, is_flexible: F) -> AllowanceReport
where
    F: Fn(&str, &str) -> bool,
{
    let mut in_year: Vec<&Contribution> = contributions
        .iter()
        .filter(|c| c.tax_year() == tax_year)
        .collect();
    in_year.sort_by_key(|c| c.date);

    let mut accounts: BTreeMap<String, AccountSummary> = BTreeMap::new();
    for contribution in in_year {
        let key = derive_key(&contribution.provider, &contribution.isa_type);
        let account = accounts.entry(key).or_insert_with(|| {
            AccountSummary::new(
                contribution,
                is_flexible(&contribution.provider, &contribution.isa_type),
            )
        });
        account.apply(contribution);
        log::debug!(
            "{} {:?} {} -> counted {}",
            contribution.date,
            contribution.kind,
            contribution.amount,
            account.counted
        );
    }

    let mut subscribed = Decimal::ZERO;
    let mut lifetime_subscribed = Decimal::ZERO;
    let mut junior_subscribed = Decimal::ZERO;
    for account in accounts.values() {
        match account.kind {
            IsaType::Junior => junior_subscribed += account.counted,
            IsaType::Lifetime => {
                lifetime_subscribed += account.counted;
                subscribed += account.counted;
            }
            _ => subscribed += account.counted,
        }
    }

    let allowance = tax_year.isa_allowance();
    let lifetime_allowance = tax_year.lifetime_isa_allowance();
    let junior_allowance = tax_year.junior_isa_allowance();

    let mut warnings = Vec::new();
    if subscribed > allowance {
        warnings.push(Warning::AllowanceExceeded {
            excess: subscribed - allowance,
        });
    }
    if lifetime_subscribed > lifetime_allowance {
        warnings.push(Warning::LifetimeLimitExceeded {
            excess: lifetime_subscribed - lifetime_allowance,
        });
    }
    if junior_subscribed > junior_allowance {
        warnings.push(Warning::JuniorLimitExceeded {
            excess: junior_subscribed - junior_allowance,
        });
    }

    let mut accounts: Vec<AccountSummary> = accounts.into_values().collect();
    accounts.sort_by(|a, b| (&a.provider, &a.isa_type).cmp(&(&b.provider, &b.isa_type)));

    AllowanceReport {
        tax_year,
        allowance,
        subscribed,
        remaining: (allowance - subscribed).max(Decimal::ZERO),
        lifetime_allowance,
        lifetime_subscribed,
        junior_allowance,
        junior_subscribed,
        accounts,
        warnings,
    }
}
