//! Customer-level feature record and its CSV persistence.

use crate::amount::Amount;
use crate::error::Result;
use std::io::Write;

/// Placeholder for a categorical attribute absent on the selected row.
pub const UNKNOWN: &str = "UNKNOWN";

/// Output column order; `return_count` is appended in the enriched variant.
pub const CUSTOMER_HEADERS: [&str; 10] = [
    "id",
    "calibration_value",
    "chain",
    "dept",
    "category",
    "brand",
    "productmeasure",
    "holdout_value",
    "log_calibration_value",
    "label",
];

/// Features of a single customer.
///
/// # Invariants
///
/// - `calibration_value > 0`, so `log_calibration_value` is finite
/// - `holdout_value >= 0`
/// - `label == holdout_value`
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    pub customer_id: String,

    /// Spend on the first purchase day.
    pub calibration_value: Amount,

    /// `ln(calibration_value)`.
    pub log_calibration_value: f64,

    /// Spend in the holdout window after the first purchase day.
    pub holdout_value: Amount,

    /// Prediction target, equal to `holdout_value`.
    pub label: Amount,

    /// Number of returns; `None` when return counting is disabled.
    pub return_count: Option<u64>,

    pub chain: String,
    pub department: String,
    pub category: String,
    pub brand: String,
    pub product_measure: String,
}

/// Writes customer records as CSV.
///
/// The `return_count` column is written only when `with_return_count` is set;
/// records without a count write `0` in that case.
pub fn write_customers<W: Write>(
    writer: W,
    customers: &[CustomerRecord],
    with_return_count: bool,
) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = CUSTOMER_HEADERS.to_vec();
    if with_return_count {
        header.push("return_count");
    }
    csv_writer.write_record(&header)?;

    for customer in customers {
        let mut row = vec![
            customer.customer_id.clone(),
            customer.calibration_value.to_string(),
            customer.chain.clone(),
            customer.department.clone(),
            customer.category.clone(),
            customer.brand.clone(),
            customer.product_measure.clone(),
            customer.holdout_value.to_string(),
            customer.log_calibration_value.to_string(),
            customer.label.to_string(),
        ];
        if with_return_count {
            row.push(customer.return_count.unwrap_or(0).to_string());
        }
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CustomerRecord {
        CustomerRecord {
            customer_id: "42".to_string(),
            calibration_value: Amount::from(1),
            log_calibration_value: 0.0,
            holdout_value: Amount::from(3),
            label: Amount::from(3),
            return_count: Some(2),
            chain: "205".to_string(),
            department: "7".to_string(),
            category: "707".to_string(),
            brand: UNKNOWN.to_string(),
            product_measure: "OZ".to_string(),
        }
    }

    #[test]
    fn test_output_with_return_count() {
        let mut output = Vec::new();
        write_customers(&mut output, &[sample()], true).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        let mut lines = output_str.lines();
        assert_eq!(
            lines.next(),
            Some("id,calibration_value,chain,dept,category,brand,productmeasure,holdout_value,log_calibration_value,label,return_count")
        );
        assert_eq!(lines.next(), Some("42,1,205,7,707,UNKNOWN,OZ,3,0,3,2"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_output_without_return_count() {
        let mut record = sample();
        record.return_count = None;

        let mut output = Vec::new();
        write_customers(&mut output, &[record], false).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert!(output_str.starts_with(
            "id,calibration_value,chain,dept,category,brand,productmeasure,holdout_value,log_calibration_value,label\n"
        ));
        assert!(output_str.contains("42,1,205,7,707,UNKNOWN,OZ,3,0,3\n"));
    }
}
