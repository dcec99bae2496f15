use std::borrow::Cow;

use tracing::{debug, trace};

use crate::error::{AppError, AppResult, ImportError};
use crate::models::{NewProduct, Product, ProductField};

/// Column order written by [`write_products`].
pub const EXPORT_HEADERS: [&str; 4] = ["name", "sku", "price", "description"];

/// One validated data row of an import file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    /// 1-based line of the record, counting the header as row 1.
    pub row_number: usize,
    pub name: String,
    pub sku: Option<String>,
    pub price_cents: i64,
    pub description: Option<String>,
}

impl ProductRow {
    pub fn lookup_value(&self, field: ProductField) -> Option<&str> {
        match field {
            ProductField::Name => Some(self.name.as_str()),
            ProductField::Sku => self.sku.as_deref(),
        }
    }

    pub fn to_new_product(&self, store_id: Option<i64>) -> NewProduct {
        NewProduct {
            store_id,
            name: self.name.clone(),
            sku: self.sku.clone(),
            price_cents: self.price_cents,
            description: self.description.clone(),
        }
    }
}

/// Parse an uploaded product file. The first invalid row aborts the parse.
pub fn parse_products(content: &[u8]) -> Result<Vec<ProductRow>, ImportError> {
    trace!(content_size = content.len(), "Starting product CSV parsing");

    let text = decode_text(content);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    debug!(column_count = headers.len(), "CSV headers parsed");

    let name_col = find_column(&headers, "name").ok_or(ImportError::MissingColumn("name"))?;
    let price_col = find_column(&headers, "price").ok_or(ImportError::MissingColumn("price"))?;
    let sku_col = find_column(&headers, "sku");
    let description_col = find_column(&headers, "description");

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let row_number = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);

        let name = record.get(name_col).unwrap_or("").to_string();
        if name.is_empty() {
            return Err(ImportError::Row {
                row: row_number,
                message: "missing name".into(),
            });
        }

        let raw_price = record.get(price_col).unwrap_or("");
        if raw_price.is_empty() {
            return Err(ImportError::Row {
                row: row_number,
                message: "missing price".into(),
            });
        }
        let price_cents = parse_price(raw_price).ok_or_else(|| ImportError::Row {
            row: row_number,
            message: format!("invalid price '{}'", raw_price),
        })?;

        rows.push(ProductRow {
            row_number,
            name,
            sku: get_optional_field(&record, sku_col),
            price_cents,
            description: get_optional_field(&record, description_col),
        });
    }

    debug!(row_count = rows.len(), "Product CSV parsing completed");
    Ok(rows)
}

/// Serialize products as ISO-8859-1 CSV with a header row.
pub fn write_products(products: &[Product]) -> AppResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADERS)?;

    for product in products {
        let price = product.price();
        writer.write_record([
            product.name.as_str(),
            product.sku.as_deref().unwrap_or(""),
            price.as_str(),
            product.description.as_deref().unwrap_or(""),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| AppError::Io(e.into_error()))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| AppError::Internal(format!("CSV output is not UTF-8: {}", e)))?;
    Ok(encode_latin1(&text))
}

/// Parse a non-negative decimal price into cents. Accepts an optional
/// leading `$` and at most two fractional digits.
pub fn parse_price(raw: &str) -> Option<i64> {
    let s = raw.trim();
    let s = s.strip_prefix('$').unwrap_or(s).trim();
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));

    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > 2
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !frac.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse().ok()?,
    };
    whole.checked_mul(100)?.checked_add(frac)
}

/// UTF-8 with the BOM stripped, falling back to ISO-8859-1.
pub fn decode_text(content: &[u8]) -> Cow<'_, str> {
    let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);
    match std::str::from_utf8(content) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(content.iter().map(|&b| char::from(b)).collect()),
    }
}

/// Characters outside Latin-1 are replaced with `?`.
pub fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(c).unwrap_or(b'?'))
        .collect()
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
}

fn get_optional_field(record: &csv::StringRecord, col: Option<usize>) -> Option<String> {
    col.and_then(|c| record.get(c))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
