use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl Address {
    /// Single-line rendering used in tables and templates.
    pub fn one_line(&self) -> String {
        [self.street.as_str(), self.city.as_str(), self.state.as_str(), self.zip.as_str()]
            .iter()
            .filter(|part| !part.trim().is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Client {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Client {
    /// Company name when present, otherwise the contact name.
    pub fn display_name(&self) -> &str {
        self.company.as_deref().unwrap_or(&self.name)
    }
}

/// Input for creating a client. The id is derived from the display name.
#[derive(Debug, Clone, Default)]
pub struct NewClient {
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub billing_address: Option<Address>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_line_skips_blank_parts() {
        let address = Address {
            street: "12 Main St".into(),
            city: "".into(),
            state: "NY".into(),
            zip: "10001".into(),
        };
        assert_eq!(address.one_line(), "12 Main St, NY, 10001");
    }

    #[test]
    fn display_name_prefers_company() {
        let mut client = Client {
            id: "acme".into(),
            name: "Jane Doe".into(),
            company: Some("Acme".into()),
            email: None,
            phone: None,
            billing_address: None,
            notes: None,
        };
        assert_eq!(client.display_name(), "Acme");
        client.company = None;
        assert_eq!(client.display_name(), "Jane Doe");
    }
}
