//! invoice-desk: local-first invoices, estimates and payment reminders.

pub mod billing;
pub mod config;
pub mod error;
pub mod filter;
pub mod mailer;
pub mod model;
pub mod money;
pub mod reminders;
pub mod render;
pub mod report;
pub mod service;
pub mod store;
pub mod wizard;

pub use error::{AppError, Result};
pub use service::Desk;
