//! Transaction models for CSV parsing and internal representation.

use crate::amount::Amount;
use crate::error::{PreprocessError, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::str::FromStr;

/// Date format of the `date` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Raw transaction record as read from CSV.
///
/// Every field is optional so that a record can always be read; required
/// fields are enforced by [`TransactionRecord::parse`]. Columns the
/// aggregation does not use (`company`, `productsize`, `purchasequantity`)
/// are ignored; the company is already fixed by the filter that produced the
/// batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TransactionRecord {
    /// Customer identifier
    #[serde(rename = "id")]
    pub customer_id: Option<String>,

    pub chain: Option<String>,

    #[serde(rename = "dept")]
    pub department: Option<String>,

    pub category: Option<String>,

    pub brand: Option<String>,

    /// Purchase date, `YYYY-MM-DD`
    #[serde(rename = "date")]
    pub purchase_date: Option<String>,

    #[serde(rename = "productmeasure")]
    pub product_measure: Option<String>,

    /// Signed amount; negative for returns
    #[serde(rename = "purchaseamount")]
    pub purchase_amount: Option<String>,
}

impl TransactionRecord {
    /// Convenience constructor for a record with only the required fields set.
    pub fn new(customer_id: &str, purchase_date: &str, purchase_amount: &str) -> Self {
        TransactionRecord {
            customer_id: Some(customer_id.to_string()),
            purchase_date: Some(purchase_date.to_string()),
            purchase_amount: Some(purchase_amount.to_string()),
            ..Default::default()
        }
    }

    /// Sets the category attribute.
    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    /// Validates the record into a typed transaction.
    ///
    /// `row` is the 1-based position of the record in its batch and is only
    /// used for error reporting. An empty cell counts as an absent field.
    pub fn parse(&self, row: usize) -> Result<Transaction> {
        let customer_id = required(&self.customer_id, "id", row)?;
        let date = required(&self.purchase_date, "date", row)?;
        let amount = required(&self.purchase_amount, "purchaseamount", row)?;

        let purchase_date = NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|e| {
            PreprocessError::InvalidRecord {
                row,
                message: format!("bad date '{}': {}", date, e),
            }
        })?;
        let purchase_amount =
            Amount::from_str(amount).map_err(|e| PreprocessError::InvalidRecord {
                row,
                message: format!("bad purchase amount '{}': {}", amount, e),
            })?;

        Ok(Transaction {
            customer_id: customer_id.to_string(),
            purchase_date,
            purchase_amount,
            attributes: Attributes {
                chain: optional(&self.chain),
                department: optional(&self.department),
                category: optional(&self.category),
                brand: optional(&self.brand),
                product_measure: optional(&self.product_measure),
            },
        })
    }
}

fn required<'a>(
    value: &'a Option<String>,
    field: &'static str,
    row: usize,
) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PreprocessError::MissingField { field, row }),
    }
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Categorical attributes of the purchased item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pub chain: Option<String>,
    pub department: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub product_measure: Option<String>,
}

/// A validated transaction ready for aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub customer_id: String,
    pub purchase_date: NaiveDate,
    pub purchase_amount: Amount,
    pub attributes: Attributes,
}
