//! Reminders command - the deadline reminder plan for a tax year

use super::Context;
use chrono::{NaiveTime, Timelike, Weekday};
use clap::Args;
use finnest::core::{deadline_reminders, weekly_check_in, Reminder, TaxYear, Trigger, DEFAULT_LEAD_DAYS};
use tabled::{settings::Style, Table, Tabled};

#[derive(Args, Debug)]
pub struct RemindersCommand {
    /// Tax year whose deadline to remind about. Defaults to the current tax year.
    #[arg(short, long)]
    year: Option<TaxYear>,

    /// Days before 5 April to send a reminder
    #[arg(short, long, value_delimiter = ',', default_values_t = DEFAULT_LEAD_DAYS)]
    days: Vec<u32>,

    /// Also add a weekly check-in on this day (e.g. sun)
    #[arg(long)]
    weekly: Option<Weekday>,

    /// Time of the weekly check-in (HH:MM)
    #[arg(long, default_value = "18:00", value_parser = parse_time)]
    at: NaiveTime,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Tabled)]
struct ReminderRow {
    #[tabled(rename = "When")]
    when: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Tag")]
    tag: String,
}

impl RemindersCommand {
    pub fn exec(&self, ctx: &Context) -> anyhow::Result<()> {
        let tax_year = self.year.unwrap_or_else(|| ctx.current_tax_year());
        let mut reminders = deadline_reminders(tax_year, ctx.now, &self.days);
        if let Some(weekday) = self.weekly {
            reminders.push(weekly_check_in(weekday, self.at.hour(), self.at.minute())?);
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&reminders)?);
            return Ok(());
        }

        if reminders.is_empty() {
            println!("No upcoming reminders for {}", tax_year);
            return Ok(());
        }
        let rows: Vec<ReminderRow> = reminders.iter().map(reminder_row).collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
        Ok(())
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(s, "%H:%M")
}

fn reminder_row(reminder: &Reminder) -> ReminderRow {
    let when = match &reminder.trigger {
        Trigger::At { at } => at.format("%Y-%m-%d %H:%M").to_string(),
        Trigger::Weekly {
            weekday,
            hour,
            minute,
        } => format!("every {:?} {:02}:{:02}", weekday, hour, minute),
    };
    ReminderRow {
        when,
        title: reminder.title.clone(),
        tag: reminder.tag.clone(),
    }
}
