//! Email delivery.
//!
//! The desk only renders messages; a [`Mailer`] hands them off. The default
//! [`OutboxMailer`] drops each message as an `.eml` file for an external
//! sender (or a human) to pick up.

use chrono::Local;
use slug::slugify;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<PathBuf>,
}

pub trait Mailer {
    /// Deliver `email`, returning an identifier for the delivery.
    fn send(&self, email: &OutgoingEmail) -> Result<String>;
}

pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Reject header injection and obviously malformed addresses.
pub fn validate_address(address: &str) -> Result<()> {
    let address = address.trim();
    let valid = !address.is_empty()
        && !address.contains(['\r', '\n', ' '])
        && address
            .split_once('@')
            .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
    if valid {
        Ok(())
    } else {
        Err(AppError::Delivery(format!("invalid recipient address '{}'", address)))
    }
}

pub fn to_eml(email: &OutgoingEmail) -> String {
    let mut out = String::new();
    out.push_str(&format!("From: {}\r\n", email.from));
    out.push_str(&format!("To: {}\r\n", email.to));
    out.push_str(&format!("Subject: {}\r\n", email.subject.replace(['\r', '\n'], " ")));
    out.push_str(&format!("Date: {}\r\n", Local::now().to_rfc2822()));
    for attachment in &email.attachments {
        out.push_str(&format!("X-Attachment: {}\r\n", attachment.display()));
    }
    out.push_str("MIME-Version: 1.0\r\n");
    out.push_str("Content-Type: text/html; charset=utf-8\r\n\r\n");
    out.push_str(&email.html);
    out
}

impl Mailer for OutboxMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<String> {
        validate_address(&email.to)?;
        fs::create_dir_all(&self.dir)?;

        let stamp = Local::now().format("%Y%m%d-%H%M%S%3f");
        let name = format!("{}_{}.eml", stamp, slugify(&email.subject));
        let path = self.dir.join(&name);
        fs::write(&path, to_eml(email))?;

        tracing::info!("Queued email to {} at {}", email.to, path.display());
        Ok(name)
    }
}

/// Keeps messages in memory. Useful for dry runs and tests.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail_with: Option<String>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every delivery fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self { sent: Mutex::new(Vec::new()), fail_with: Some(reason.into()) }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<String> {
        if let Some(reason) = &self.fail_with {
            return Err(AppError::Delivery(reason.clone()));
        }
        validate_address(&email.to)?;
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| AppError::Delivery("mailer state poisoned".into()))?;
        sent.push(email.clone());
        Ok(format!("memory-{}", sent.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn email(to: &str) -> OutgoingEmail {
        OutgoingEmail {
            from: "billing@example.com".into(),
            to: to.into(),
            subject: "Invoice INV-01 from Example".into(),
            html: "<p>Hello</p>".into(),
            attachments: vec![PathBuf::from("/tmp/INV-01.pdf")],
        }
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!(validate_address("jane@acme.test").is_ok());
        assert!(validate_address("").is_err());
        assert!(validate_address("jane").is_err());
        assert!(validate_address("jane@localhost").is_err());
        assert!(validate_address("jane@acme.test\r\nBcc: x@y.z").is_err());
    }

    #[test]
    fn outbox_writes_eml_file() {
        let temp = TempDir::new().unwrap();
        let mailer = OutboxMailer::new(temp.path().join("outbox"));
        let name = mailer.send(&email("jane@acme.test")).unwrap();

        let content = fs::read_to_string(mailer.dir().join(&name)).unwrap();
        assert!(content.starts_with("From: billing@example.com\r\nTo: jane@acme.test\r\n"));
        assert!(content.contains("Subject: Invoice INV-01 from Example"));
        assert!(content.contains("X-Attachment: /tmp/INV-01.pdf"));
        assert!(content.ends_with("<p>Hello</p>"));
    }

    #[test]
    fn memory_mailer_records_or_fails() {
        let mailer = MemoryMailer::new();
        mailer.send(&email("jane@acme.test")).unwrap();
        assert_eq!(mailer.sent().len(), 1);

        let failing = MemoryMailer::failing("smtp down");
        assert!(matches!(failing.send(&email("jane@acme.test")), Err(AppError::Delivery(_))));
    }
}
