use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Payment {
    pub id: String,
    pub invoice: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// All payments recorded against one invoice.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PaymentLedger {
    #[serde(default)]
    pub payments: Vec<Payment>,
}
