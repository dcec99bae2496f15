use serde::{Deserialize, Serialize};

/// Column a CSV row can be matched on to update an existing product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductField {
    Name,
    Sku,
}

impl ProductField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductField::Name => "name",
            ProductField::Sku => "sku",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Some(ProductField::Name),
            "sku" => Some(ProductField::Sku),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProductField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub store_id: Option<i64>,
    pub name: String,
    pub sku: Option<String>,
    pub price_cents: i64,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Product {
    /// Price as a plain decimal string, e.g. `399.99`.
    pub fn price(&self) -> String {
        format_price(self.price_cents)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewProduct {
    pub store_id: Option<i64>,
    pub name: String,
    pub sku: Option<String>,
    pub price_cents: i64,
    pub description: Option<String>,
}

pub fn format_price(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, cents / 100, cents % 100)
}
