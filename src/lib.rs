//! UK ISA tracking: tax year arithmetic, allowance usage, flexible-ISA
//! settings and deadline reminders.

pub mod core;
