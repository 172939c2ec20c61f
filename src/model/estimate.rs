use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::items::{Discount, LineItem, Theme, Totals};
use crate::error::{AppError, Result};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EstimateStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
    Converted,
    Expired,
}

impl EstimateStatus {
    pub const ALL: [EstimateStatus; 6] = [
        EstimateStatus::Draft,
        EstimateStatus::Sent,
        EstimateStatus::Approved,
        EstimateStatus::Rejected,
        EstimateStatus::Converted,
        EstimateStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateStatus::Draft => "draft",
            EstimateStatus::Sent => "sent",
            EstimateStatus::Approved => "approved",
            EstimateStatus::Rejected => "rejected",
            EstimateStatus::Converted => "converted",
            EstimateStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for EstimateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EstimateStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        EstimateStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::Validation(format!("unknown estimate status '{}'", s)))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Estimate {
    pub number: String,
    pub client_id: String,
    pub issue_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub discount: Discount,
    #[serde(default)]
    pub tax_rate: f64,
    pub totals: Totals,
    pub status: EstimateStatus,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_invoice: Option<String>,
}

impl Estimate {
    /// Status as shown to the user: a sent estimate past its expiry date
    /// reads as expired even before `expire` persists it.
    pub fn effective_status(&self, today: NaiveDate) -> EstimateStatus {
        if self.status == EstimateStatus::Sent && self.expiry_date < today {
            EstimateStatus::Expired
        } else {
            self.status
        }
    }

    pub fn transition(&mut self, target: EstimateStatus, on: NaiveDate) -> Result<()> {
        use EstimateStatus::*;

        let allowed = match (self.status, target) {
            (Draft | Sent, Sent) => true,
            (Sent, Approved | Rejected | Expired) => true,
            (Approved, Converted) => true,
            _ => false,
        };

        if !allowed {
            return Err(AppError::InvalidTransition {
                kind: "estimate",
                id: self.number.clone(),
                status: self.status.to_string(),
                action: match target {
                    Draft => "revert to draft",
                    Sent => "send",
                    Approved => "approve",
                    Rejected => "reject",
                    Converted => "convert",
                    Expired => "expire",
                },
            });
        }

        match target {
            Sent if self.sent_on.is_none() => self.sent_on = Some(on),
            Approved | Rejected => self.decided_on = Some(on),
            _ => {}
        }
        self.status = target;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct EstimateDraft {
    pub client_id: String,
    pub issue_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub items: Vec<LineItem>,
    pub discount: Discount,
    pub tax_rate: Option<f64>,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub theme: Option<Theme>,
}

impl EstimateDraft {
    pub fn new(client_id: impl Into<String>, issue_date: NaiveDate, items: Vec<LineItem>) -> Self {
        Self {
            client_id: client_id.into(),
            issue_date,
            expiry_date: None,
            items,
            discount: Discount::None,
            tax_rate: None,
            currency: None,
            notes: None,
            theme: None,
        }
    }
}
