pub mod clock;
pub mod contributions;
pub mod reminders;
pub mod settings;
pub mod store;
pub mod tax_year;

// Flat public surface for domain types and functions.
pub use clock::{Clock, FixedClock, SystemClock};
pub use contributions::{
    allowance_report, AccountSummary, AllowanceReport, Contribution, ContributionError,
    ContributionInput, ContributionKind, IsaType, Warning,
};
pub use reminders::{
    deadline_reminders, schedule_all, weekly_check_in, NotificationScheduler, Reminder,
    ReminderError, Trigger, DEFAULT_LEAD_DAYS,
};
pub use settings::{derive_key, IsaAccountSetting, IsaSettings, SettingsMap, SETTINGS_SLOT};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use tax_year::{
    available_tax_years, available_tax_years_at, ParseTaxYearError, TaxYear,
    DEFAULT_YEARS_BACK, DEFAULT_YEARS_FORWARD,
};
