//! Settings commands - flexible-ISA flags per provider and account type

use super::Context;
use clap::{ArgAction, Args, Subcommand};
use finnest::core::{derive_key, IsaAccountSetting};
use tabled::{settings::Style, Table, Tabled};

#[derive(Args, Debug)]
pub struct SettingsCommand {
    #[command(subcommand)]
    action: SettingsAction,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// List every stored setting
    List {
        /// Output as JSON instead of formatted table
        #[arg(long)]
        json: bool,
    },
    /// Show the setting for one account
    Get {
        /// Provider name, e.g. "Vanguard"
        provider: String,
        /// ISA type, e.g. "stocks_shares"
        isa_type: String,
        /// Output as JSON (null when absent)
        #[arg(long)]
        json: bool,
    },
    /// Print whether an account is a flexible ISA (false when unset)
    IsFlexible { provider: String, isa_type: String },
    /// Store the flexible flag for an account
    Set {
        provider: String,
        isa_type: String,
        /// true if withdrawals can be replaced within the tax year
        #[arg(long, action = ArgAction::Set)]
        flexible: bool,
    },
    /// Remove the setting for an account
    Delete { provider: String, isa_type: String },
    /// Remove every stored setting
    Clear,
}

#[derive(Debug, Clone, Tabled)]
struct SettingRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "ISA Type")]
    isa_type: String,
    #[tabled(rename = "Flexible")]
    flexible: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl SettingsCommand {
    pub fn exec(&self, ctx: &Context) -> anyhow::Result<()> {
        let settings = ctx.settings();
        match &self.action {
            SettingsAction::List { json } => {
                let all = settings.load_all();
                if *json {
                    println!("{}", serde_json::to_string_pretty(&all)?);
                } else if all.is_empty() {
                    println!("No ISA settings stored");
                } else {
                    let rows: Vec<SettingRow> = all
                        .iter()
                        .map(|(key, setting)| setting_row(key, setting))
                        .collect();
                    println!("{}", Table::new(rows).with(Style::rounded()));
                }
            }
            SettingsAction::Get {
                provider,
                isa_type,
                json,
            } => {
                let setting = settings.get(provider, isa_type);
                if *json {
                    println!("{}", serde_json::to_string_pretty(&setting)?);
                } else {
                    match setting {
                        Some(setting) => {
                            let key = derive_key(provider, isa_type);
                            println!("{}", Table::new([setting_row(&key, &setting)]).with(Style::rounded()));
                        }
                        None => println!("No setting for {}", derive_key(provider, isa_type)),
                    }
                }
            }
            SettingsAction::IsFlexible { provider, isa_type } => {
                println!("{}", settings.is_flexible(provider, isa_type));
            }
            SettingsAction::Set {
                provider,
                isa_type,
                flexible,
            } => {
                let saved = settings.set(provider, isa_type, *flexible)?;
                println!(
                    "Saved {}: flexible = {}",
                    derive_key(&saved.provider, &saved.isa_type),
                    saved.is_flexible
                );
            }
            SettingsAction::Delete { provider, isa_type } => {
                let key = derive_key(provider, isa_type);
                if settings.delete(provider, isa_type)? {
                    println!("Deleted {}", key);
                } else {
                    println!("No setting for {}", key);
                }
            }
            SettingsAction::Clear => {
                settings.clear()?;
                println!("Cleared all ISA settings");
            }
        }
        Ok(())
    }
}

fn setting_row(key: &str, setting: &IsaAccountSetting) -> SettingRow {
    SettingRow {
        key: key.to_string(),
        provider: setting.provider.clone(),
        isa_type: setting.isa_type.clone(),
        flexible: if setting.is_flexible { "yes" } else { "no" }.to_string(),
        updated: setting.created_date.format("%Y-%m-%d %H:%M").to_string(),
    }
}
