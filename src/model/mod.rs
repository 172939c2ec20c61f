//! Records persisted under the data root.

pub mod client;
pub mod estimate;
pub mod invoice;
pub mod items;
pub mod payment;
pub mod reminder;
pub mod settings;

pub use client::{Address, Client, NewClient};
pub use estimate::{Estimate, EstimateDraft, EstimateStatus};
pub use invoice::{
    Invoice, InvoiceDraft, InvoiceStatus, LateFeeKind, LateFeePolicy, PaymentTerms,
    ReminderRule, ReminderSettings, ReminderTiming,
};
pub use items::{Discount, LineItem, Theme, Totals};
pub use payment::{Payment, PaymentLedger};
pub use reminder::{ReminderHistory, ReminderLog, ReminderStatus, ReminderType};
pub use settings::{BusinessProfile, BusinessSettings, Defaults, Limits, PaymentMethods};
