use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub rate: f64,
}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: f64, rate: f64) -> Self {
        Self { description: description.into(), quantity, rate }
    }

    pub fn amount(&self) -> f64 {
        crate::money::round_cents(self.quantity * self.rate)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Discount {
    #[default]
    None,
    Percentage(f64),
    Fixed(f64),
}

/// Derived amounts, persisted alongside the items so lists don't recompute.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Totals {
    pub subtotal: f64,
    pub discount: f64,
    pub tax: f64,
    pub total: f64,
}

/// Visual theme: template id plus the colors layouts 2-4 substitute.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Theme {
    pub template_id: u8,
    #[serde(default = "default_primary")]
    pub primary_color: String,
    #[serde(default = "default_accent")]
    pub accent_color: String,
}

fn default_primary() -> String {
    "#1f2937".to_string()
}

fn default_accent() -> String {
    "#2563eb".to_string()
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            template_id: 1,
            primary_color: default_primary(),
            accent_color: default_accent(),
        }
    }
}
