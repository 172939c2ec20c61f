use serde::{Deserialize, Serialize};

use super::invoice::{LateFeeKind, LateFeePolicy, ReminderRule, ReminderTiming};
use super::items::Theme;

/// Business profile printed on every invoice, estimate and email.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BusinessProfile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address1: String,
    #[serde(default)]
    pub address2: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub tax_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct PaymentMethods {
    #[serde(default)]
    pub bank_transfer: String,
    #[serde(default)]
    pub paypal: String,
    #[serde(default)]
    pub payment_link: String,
    #[serde(default)]
    pub other: String,
}

impl PaymentMethods {
    /// Non-empty methods as `(label, value)` pairs, in display order.
    pub fn listed(&self) -> Vec<(&'static str, &str)> {
        [
            ("Bank transfer", self.bank_transfer.as_str()),
            ("PayPal", self.paypal.as_str()),
            ("Pay online", self.payment_link.as_str()),
            ("Other", self.other.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Defaults {
    pub currency: String,
    pub payment_terms_days: i64,
    pub estimate_valid_days: i64,
    #[serde(default)]
    pub tax_rate: f64,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_fees: Option<LateFeePolicy>,
    #[serde(default)]
    pub reminder_rules: Vec<ReminderRule>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            payment_terms_days: 30,
            estimate_valid_days: 30,
            tax_rate: 0.0,
            theme: Theme::default(),
            late_fees: Some(LateFeePolicy {
                enabled: false,
                kind: LateFeeKind::Percentage,
                amount: 1.5,
                grace_period: 3,
            }),
            reminder_rules: vec![
                ReminderRule { days: 3, timing: ReminderTiming::Before },
                ReminderRule { days: 0, timing: ReminderTiming::On },
                ReminderRule { days: 7, timing: ReminderTiming::After },
                ReminderRule { days: 30, timing: ReminderTiming::After },
            ],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Limits {
    /// Invoices that may be created per calendar month; unset means
    /// unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_invoices: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BusinessSettings {
    pub business: BusinessProfile,
    #[serde(default)]
    pub payment: PaymentMethods,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub limits: Limits,
}
