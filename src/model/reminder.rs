use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AppError, Result};

/// Tone of a reminder, escalating with how late the invoice is.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ReminderType {
    Friendly,
    Polite,
    Firm,
    Urgent,
}

impl ReminderType {
    pub const ALL: [ReminderType; 4] = [
        ReminderType::Friendly,
        ReminderType::Polite,
        ReminderType::Firm,
        ReminderType::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderType::Friendly => "friendly",
            ReminderType::Polite => "polite",
            ReminderType::Firm => "firm",
            ReminderType::Urgent => "urgent",
        }
    }
}

impl fmt::Display for ReminderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReminderType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        ReminderType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::Validation(format!("unknown reminder type '{}'", s)))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Sent,
    Failed,
    Scheduled,
    Delivered,
    Bounced,
    Cancelled,
}

impl ReminderStatus {
    pub const ALL: [ReminderStatus; 6] = [
        ReminderStatus::Sent,
        ReminderStatus::Failed,
        ReminderStatus::Scheduled,
        ReminderStatus::Delivered,
        ReminderStatus::Bounced,
        ReminderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Sent => "sent",
            ReminderStatus::Failed => "failed",
            ReminderStatus::Scheduled => "scheduled",
            ReminderStatus::Delivered => "delivered",
            ReminderStatus::Bounced => "bounced",
            ReminderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReminderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        ReminderStatus::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::Validation(format!("unknown reminder status '{}'", s)))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReminderHistory {
    pub id: String,
    pub invoice: String,
    pub reminder_type: ReminderType,
    pub reminder_status: ReminderStatus,
    pub overdue_days: i64,
    pub sent_on: NaiveDate,
    /// Trigger date of the rule that produced this entry, if any. Manual
    /// reminders leave it empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Reminder history for one invoice.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ReminderLog {
    #[serde(default)]
    pub reminders: Vec<ReminderHistory>,
}
