//! ISA deadline reminders for a local notification scheduler

use super::tax_year::TaxYear;
use chrono::{Duration, NaiveDateTime, Weekday};
use serde::Serialize;
use std::fmt;

/// Days before 5 April to remind about unused allowance
pub const DEFAULT_LEAD_DAYS: [u32; 3] = [30, 7, 1];

/// Local hour deadline reminders fire at
const REMINDER_HOUR: u32 = 9;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReminderError {
    #[error("hour must be 0-23, got {0}")]
    InvalidHour(u32),
    #[error("minute must be 0-59, got {0}")]
    InvalidMinute(u32),
}

/// When a reminder fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Trigger {
    /// Once, at a local date and time
    At { at: NaiveDateTime },
    /// Every week on `weekday` at `hour:minute` local time
    Weekly {
        weekday: Weekday,
        hour: u32,
        minute: u32,
    },
}

/// Notification payload plus trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub title: String,
    pub body: String,
    /// Opaque tag handed back by the scheduler with the notification
    pub tag: String,
    pub trigger: Trigger,
}

/// Deadline reminders for `tax_year`, one per lead time, that are still in the
/// future at `now`. Ordered by when they fire.
pub fn deadline_reminders(tax_year: TaxYear, now: NaiveDateTime, lead_days: &[u32]) -> Vec<Reminder> {
    let deadline = tax_year.deadline().date();
    let mut reminders: Vec<Reminder> = lead_days
        .iter()
        .filter_map(|&days| {
            let fire_at = deadline
                .checked_sub_signed(Duration::days(days as i64))?
                .and_hms_opt(REMINDER_HOUR, 0, 0)?;
            if fire_at <= now {
                log::debug!("Skipping {} day reminder for {}: already past", days, tax_year);
                return None;
            }
            Some(Reminder {
                title: deadline_title(days),
                body: format!(
                    "The {} tax year ends on 5 April {}. Use any remaining ISA allowance before then.",
                    tax_year,
                    tax_year.end_year()
                ),
                tag: format!("isa-deadline:{}:{}", tax_year, days),
                trigger: Trigger::At { at: fire_at },
            })
        })
        .collect();
    reminders.sort_by_key(|r| match r.trigger {
        Trigger::At { at } => Some(at),
        Trigger::Weekly { .. } => None,
    });
    reminders.dedup_by(|a, b| a.tag == b.tag);
    reminders
}

fn deadline_title(days: u32) -> String {
    match days {
        0 => "ISA deadline is today".to_string(),
        1 => "ISA deadline tomorrow".to_string(),
        n => format!("ISA deadline in {} days", n),
    }
}

/// Recurring nudge to record new contributions
pub fn weekly_check_in(weekday: Weekday, hour: u32, minute: u32) -> Result<Reminder, ReminderError> {
    if hour > 23 {
        return Err(ReminderError::InvalidHour(hour));
    }
    if minute > 59 {
        return Err(ReminderError::InvalidMinute(minute));
    }
    Ok(Reminder {
        title: "Log your ISA contributions".to_string(),
        body: "Keep your allowance up to date by recording this week's deposits and withdrawals."
            .to_string(),
        tag: format!("isa-check-in:{:?}", weekday),
        trigger: Trigger::Weekly {
            weekday,
            hour,
            minute,
        },
    })
}

/// A device notification service
pub trait NotificationScheduler {
    type Error: fmt::Display;

    /// Register a reminder, returning the scheduler's id for it
    fn schedule(&mut self, reminder: &Reminder) -> Result<String, Self::Error>;
}

/// Schedule every reminder, logging and skipping any the scheduler refuses
pub fn schedule_all<S: NotificationScheduler>(scheduler: &mut S, reminders: &[Reminder]) -> Vec<String> {
    let mut ids = Vec::with_capacity(reminders.len());
    for reminder in reminders {
        match scheduler.schedule(reminder) {
            Ok(id) => {
                log::info!("Scheduled reminder {} as {}", reminder.tag, id);
                ids.push(id);
            }
            Err(err) => log::warn!("Failed to schedule reminder {}: {}", reminder.tag, err),
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn deadline_reminders_before_the_deadline() {
        let ty = TaxYear::boundaries_for(2024);
        let reminders = deadline_reminders(ty, at(2025, 1, 1, 12), &DEFAULT_LEAD_DAYS);

        assert_eq!(reminders.len(), 3);
        assert_eq!(reminders[0].trigger, Trigger::At { at: at(2025, 3, 6, 9) });
        assert_eq!(reminders[1].trigger, Trigger::At { at: at(2025, 3, 29, 9) });
        assert_eq!(reminders[2].trigger, Trigger::At { at: at(2025, 4, 4, 9) });
        assert_eq!(reminders[0].title, "ISA deadline in 30 days");
        assert_eq!(reminders[2].title, "ISA deadline tomorrow");
        assert_eq!(reminders[1].tag, "isa-deadline:2024/25:7");
        assert!(reminders[0].body.contains("5 April 2025"));
    }

    #[test]
    fn past_reminders_are_skipped() {
        let ty = TaxYear::boundaries_for(2024);
        let reminders = deadline_reminders(ty, at(2025, 3, 29, 9), &DEFAULT_LEAD_DAYS);
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].tag, "isa-deadline:2024/25:1");

        assert!(deadline_reminders(ty, at(2025, 4, 6, 0), &DEFAULT_LEAD_DAYS).is_empty());
    }

    #[test]
    fn same_day_reminder() {
        let ty = TaxYear::boundaries_for(2024);
        let reminders = deadline_reminders(ty, at(2025, 4, 5, 8), &[0, 0]);
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].title, "ISA deadline is today");
    }

    #[test]
    fn weekly_check_in_validates_time() {
        let reminder = weekly_check_in(Weekday::Sun, 18, 30).unwrap();
        assert_eq!(
            reminder.trigger,
            Trigger::Weekly {
                weekday: Weekday::Sun,
                hour: 18,
                minute: 30
            }
        );
        assert_eq!(weekly_check_in(Weekday::Mon, 24, 0), Err(ReminderError::InvalidHour(24)));
        assert_eq!(weekly_check_in(Weekday::Mon, 9, 60), Err(ReminderError::InvalidMinute(60)));
    }

    struct FlakyScheduler {
        calls: usize,
    }

    impl NotificationScheduler for FlakyScheduler {
        type Error = String;

        fn schedule(&mut self, reminder: &Reminder) -> Result<String, String> {
            self.calls += 1;
            if self.calls == 2 {
                return Err("permission denied".to_string());
            }
            Ok(format!("n{}-{}", self.calls, reminder.tag))
        }
    }

    #[test]
    fn schedule_all_skips_failures() {
        let ty = TaxYear::boundaries_for(2024);
        let reminders = deadline_reminders(ty, at(2025, 1, 1, 0), &DEFAULT_LEAD_DAYS);
        let mut scheduler = FlakyScheduler { calls: 0 };

        let ids = schedule_all(&mut scheduler, &reminders);
        assert_eq!(scheduler.calls, 3);
        assert_eq!(
            ids,
            vec!["n1-isa-deadline:2024/25:30", "n3-isa-deadline:2024/25:1"]
        );
    }
}
