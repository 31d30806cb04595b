//! Transaction-to-customer aggregation.
//!
//! Splits each customer's purchase history into a calibration day (the first
//! purchase date) and a holdout window after it, and folds both into one
//! [`CustomerRecord`] per customer. The aggregation is a pure function of its
//! input; progress is reported through an [`AggregationObserver`].

use crate::amount::Amount;
use crate::customer::{CustomerRecord, UNKNOWN};
use crate::error::{PreprocessError, Result};
use crate::transaction::{Attributes, Transaction, TransactionRecord};
use chrono::{Duration, NaiveDate};
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Default holdout window length in calendar days.
pub const DEFAULT_HOLDOUT_DAYS: i64 = 365;

/// Aggregation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Length of the holdout window. The window is `(start, start + days]`.
    pub holdout_days: i64,

    /// Whether to count returns per customer (the enriched variant).
    pub count_returns: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        AggregatorConfig {
            holdout_days: DEFAULT_HOLDOUT_DAYS,
            count_returns: true,
        }
    }
}

/// How the input batch split by amount sign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionSummary {
    pub records: usize,
    pub purchases: usize,
    pub returns: usize,
    /// Zero-amount transactions, excluded from everything.
    pub dropped: usize,
}

/// Receives progress events from the aggregator.
///
/// All methods default to no-ops.
pub trait AggregationObserver: Send + Sync {
    fn partitioned(&self, _summary: &PartitionSummary) {}

    fn aggregated(&self, _customers: usize) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AggregationObserver for NoopObserver {}

/// Observer that forwards events to the `log` facade, tagged with a company.
#[derive(Debug, Clone)]
pub struct LogObserver {
    company: String,
}

impl LogObserver {
    pub fn new(company: impl Into<String>) -> Self {
        LogObserver {
            company: company.into(),
        }
    }
}

impl AggregationObserver for LogObserver {
    fn partitioned(&self, summary: &PartitionSummary) {
        debug!(
            "Company {}: {} records, {} purchases, {} returns, {} zero-amount dropped",
            self.company, summary.records, summary.purchases, summary.returns, summary.dropped
        );
    }

    fn aggregated(&self, customers: usize) {
        info!("Company {}: aggregated {} customers", self.company, customers);
    }
}

/// Per-customer running totals over the purchases.
struct CustomerAccumulator<'a> {
    start_date: NaiveDate,
    calibration_value: Amount,
    holdout_value: Amount,
    /// Highest calibration-day purchase seen so far.
    top: Option<(Amount, &'a Attributes)>,
}

impl<'a> CustomerAccumulator<'a> {
    fn new(start_date: NaiveDate) -> Self {
        CustomerAccumulator {
            start_date,
            calibration_value: Amount::ZERO,
            holdout_value: Amount::ZERO,
            top: None,
        }
    }

    fn add(&mut self, tx: &'a Transaction, holdout_end: NaiveDate) {
        if tx.purchase_date == self.start_date {
            self.calibration_value += tx.purchase_amount;
            // Strict comparison keeps the first of equal maxima in input order.
            let replace = match self.top {
                Some((best, _)) => tx.purchase_amount > best,
                None => true,
            };
            if replace {
                self.top = Some((tx.purchase_amount, &tx.attributes));
            }
        } else if tx.purchase_date > self.start_date && tx.purchase_date <= holdout_end {
            self.holdout_value += tx.purchase_amount;
        }
    }
}

/// Turns one company's transactions into customer feature records.
#[derive(Clone)]
pub struct CustomerAggregator {
    config: AggregatorConfig,
    observer: Arc<dyn AggregationObserver>,
}

impl CustomerAggregator {
    /// Creates an aggregator that reports to no one.
    pub fn new(config: AggregatorConfig) -> Self {
        CustomerAggregator {
            config,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Replaces the observer.
    pub fn with_observer(mut self, observer: Arc<dyn AggregationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Validates raw records and aggregates them.
    ///
    /// Every record is validated before any aggregation starts, so a single
    /// missing required field fails the whole batch.
    pub fn aggregate(&self, records: &[TransactionRecord]) -> Result<Vec<CustomerRecord>> {
        let transactions = records
            .iter()
            .enumerate()
            .map(|(idx, record)| record.parse(idx + 1))
            .collect::<Result<Vec<_>>>()?;

        self.aggregate_transactions(&transactions)
    }

    /// Aggregates validated transactions.
    ///
    /// Output is sorted by customer id.
    pub fn aggregate_transactions(
        &self,
        transactions: &[Transaction],
    ) -> Result<Vec<CustomerRecord>> {
        if transactions.is_empty() {
            return Err(PreprocessError::EmptyInput(
                "transaction batch is empty".to_string(),
            ));
        }

        let mut summary = PartitionSummary {
            records: transactions.len(),
            ..Default::default()
        };
        let mut purchases: Vec<&Transaction> = Vec::new();
        let mut return_counts: HashMap<&str, u64> = HashMap::new();

        for tx in transactions {
            if tx.purchase_amount.is_positive() {
                purchases.push(tx);
            } else if tx.purchase_amount.is_negative() {
                summary.returns += 1;
                if self.config.count_returns {
                    *return_counts.entry(tx.customer_id.as_str()).or_insert(0) += 1;
                }
            } else {
                summary.dropped += 1;
            }
        }
        summary.purchases = purchases.len();
        self.observer.partitioned(&summary);

        if purchases.is_empty() {
            return Err(PreprocessError::EmptyInput(format!(
                "none of {} transactions has a positive purchase amount",
                transactions.len()
            )));
        }

        let mut start_dates: HashMap<&str, NaiveDate> = HashMap::new();
        for &tx in &purchases {
            start_dates
                .entry(tx.customer_id.as_str())
                .and_modify(|d| *d = (*d).min(tx.purchase_date))
                .or_insert(tx.purchase_date);
        }

        let window = holdout_window(self.config.holdout_days)?;
        let mut accumulators: BTreeMap<&str, CustomerAccumulator> = BTreeMap::new();
        for &tx in &purchases {
            let id = tx.customer_id.as_str();
            let start_date = start_dates[id];
            let holdout_end = start_date
                .checked_add_signed(window)
                .unwrap_or(NaiveDate::MAX);
            accumulators
                .entry(id)
                .or_insert_with(|| CustomerAccumulator::new(start_date))
                .add(tx, holdout_end);
        }

        let customers = accumulators
            .into_iter()
            .map(|(id, acc)| {
                let return_count = if self.config.count_returns {
                    Some(return_counts.get(id).copied().unwrap_or(0))
                } else {
                    None
                };
                build_record(id, acc, return_count)
            })
            .collect::<Result<Vec<_>>>()?;

        self.observer.aggregated(customers.len());
        Ok(customers)
    }
}

/// Holdout length as a `Duration`, rejecting non-positive or unrepresentable spans.
pub(crate) fn holdout_window(days: i64) -> Result<Duration> {
    Duration::try_days(days)
        .filter(|_| days > 0)
        .ok_or_else(|| {
            PreprocessError::InvalidConfig(format!(
                "holdout_days must be positive and representable, got {}",
                days
            ))
        })
}

fn build_record(
    customer_id: &str,
    acc: CustomerAccumulator<'_>,
    return_count: Option<u64>,
) -> Result<CustomerRecord> {
    let non_positive = || PreprocessError::NonPositiveCalibration {
        customer_id: customer_id.to_string(),
        value: acc.calibration_value.to_string(),
    };
    if !acc.calibration_value.is_positive() {
        return Err(non_positive());
    }
    let calibration = acc.calibration_value.to_f64().ok_or_else(non_positive)?;

    let attributes = acc
        .top
        .map(|(_, attrs)| attrs.clone())
        .unwrap_or_default();
    let or_unknown = |value: Option<String>| value.unwrap_or_else(|| UNKNOWN.to_string());

    Ok(CustomerRecord {
        customer_id: customer_id.to_string(),
        calibration_value: acc.calibration_value,
        log_calibration_value: calibration.ln(),
        holdout_value: acc.holdout_value,
        label: acc.holdout_value,
        return_count,
        chain: or_unknown(attributes.chain),
        department: or_unknown(attributes.department),
        category: or_unknown(attributes.category),
        brand: or_unknown(attributes.brand),
        product_measure: or_unknown(attributes.product_measure),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn aggregate(records: &[TransactionRecord]) -> Vec<CustomerRecord> {
        CustomerAggregator::new(AggregatorConfig::default())
            .aggregate(records)
            .unwrap()
    }

    fn customer<'a>(customers: &'a [CustomerRecord], id: &str) -> &'a CustomerRecord {
        customers.iter().find(|c| c.customer_id == id).unwrap()
    }

    #[test]
    fn test_calibration_and_holdout() {
        let records = vec![
            TransactionRecord::new("A", "2012-03-01", "10").with_category("X"),
            TransactionRecord::new("A", "2012-03-01", "5").with_category("Y"),
            TransactionRecord::new("A", "2012-03-11", "3"),
            TransactionRecord::new("A", "2013-04-05", "50"),
        ];

        let customers = aggregate(&records);
        assert_eq!(customers.len(), 1);

        let a = customer(&customers, "A");
        assert_eq!(a.calibration_value, Amount::from(15));
        assert_eq!(a.holdout_value, Amount::from(3));
        assert_eq!(a.label, Amount::from(3));
        assert_eq!(a.category, "X");
        assert_eq!(a.chain, UNKNOWN);
        assert_eq!(a.return_count, Some(0));
        assert!((a.log_calibration_value - 15f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_earlier_purchase_in_later_row_sets_start() {
        let records = vec![
            TransactionRecord::new("A", "2012-05-01", "7"),
            TransactionRecord::new("A", "2012-04-01", "2"),
        ];

        let customers = aggregate(&records);
        let a = customer(&customers, "A");
        assert_eq!(a.calibration_value, Amount::from(2));
        assert_eq!(a.holdout_value, Amount::from(7));
    }

    #[test]
    fn test_returns_counted_but_not_summed() {
        let records = vec![
            TransactionRecord::new("A", "2012-03-01", "-4"),
            TransactionRecord::new("A", "2012-03-01", "6"),
            TransactionRecord::new("A", "2012-03-02", "-1"),
            TransactionRecord::new("A", "2012-03-03", "0"),
        ];

        let customers = aggregate(&records);
        let a = customer(&customers, "A");
        assert_eq!(a.calibration_value, Amount::from(6));
        assert_eq!(a.holdout_value, Amount::ZERO);
        assert_eq!(a.return_count, Some(2));
    }

    #[test]
    fn test_return_counting_disabled() {
        let config = AggregatorConfig {
            count_returns: false,
            ..Default::default()
        };
        let records = vec![
            TransactionRecord::new("A", "2012-03-01", "-4"),
            TransactionRecord::new("A", "2012-03-01", "6"),
        ];

        let customers = CustomerAggregator::new(config).aggregate(&records).unwrap();
        assert_eq!(customers[0].return_count, None);
    }

    #[test]
    fn test_custom_holdout_window() {
        let config = AggregatorConfig {
            holdout_days: 30,
            ..Default::default()
        };
        let records = vec![
            TransactionRecord::new("A", "2012-03-01", "1"),
            TransactionRecord::new("A", "2012-03-31", "2"),
            TransactionRecord::new("A", "2012-04-01", "4"),
        ];

        let customers = CustomerAggregator::new(config).aggregate(&records).unwrap();
        assert_eq!(customers[0].holdout_value, Amount::from(2));
    }

    #[test]
    fn test_oversized_holdout_window_is_an_error() {
        let config = AggregatorConfig {
            holdout_days: i64::MAX,
            ..Default::default()
        };
        let records = vec![TransactionRecord::new("A", "2012-03-01", "1")];

        let result = CustomerAggregator::new(config).aggregate(&records);
        assert!(matches!(result, Err(PreprocessError::InvalidConfig(_))));
    }

    #[test]
    fn test_long_holdout_window_saturates_at_max_date() {
        let config = AggregatorConfig {
            holdout_days: 100_000_000,
            ..Default::default()
        };
        let records = vec![
            TransactionRecord::new("A", "2012-03-01", "1"),
            TransactionRecord::new("A", "9999-12-31", "5"),
        ];

        let customers = CustomerAggregator::new(config).aggregate(&records).unwrap();
        assert_eq!(customers[0].holdout_value, Amount::from(5));
    }

    #[test]
    fn test_output_sorted_by_customer() {
        let records = vec![
            TransactionRecord::new("b", "2012-03-01", "1"),
            TransactionRecord::new("c", "2012-03-01", "1"),
            TransactionRecord::new("a", "2012-03-01", "1"),
        ];

        let ids: Vec<_> = aggregate(&records)
            .into_iter()
            .map(|c| c.customer_id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_batch_fails() {
        let result = CustomerAggregator::new(AggregatorConfig::default()).aggregate(&[]);
        assert!(matches!(result, Err(PreprocessError::EmptyInput(_))));
    }

    #[test]
    fn test_missing_field_fails_before_aggregation() {
        let observer = Arc::new(RecordingObserver::default());
        let mut broken = TransactionRecord::new("B", "2012-03-01", "1");
        broken.customer_id = None;
        let records = vec![TransactionRecord::new("A", "2012-03-01", "1"), broken];

        let result = CustomerAggregator::new(AggregatorConfig::default())
            .with_observer(observer.clone())
            .aggregate(&records);

        assert!(matches!(
            result,
            Err(PreprocessError::MissingField { field: "id", row: 2 })
        ));
        assert!(observer.events.lock().unwrap().is_empty());
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl AggregationObserver for RecordingObserver {
        fn partitioned(&self, summary: &PartitionSummary) {
            self.events.lock().unwrap().push(format!(
                "partitioned {}/{}/{}/{}",
                summary.records, summary.purchases, summary.returns, summary.dropped
            ));
        }

        fn aggregated(&self, customers: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("aggregated {}", customers));
        }
    }

    #[test]
    fn test_observer_receives_events() {
        let observer = Arc::new(RecordingObserver::default());
        let records = vec![
            TransactionRecord::new("A", "2012-03-01", "1"),
            TransactionRecord::new("A", "2012-03-02", "-1"),
            TransactionRecord::new("B", "2012-03-02", "0"),
            TransactionRecord::new("B", "2012-03-03", "2"),
        ];

        CustomerAggregator::new(AggregatorConfig::default())
            .with_observer(observer.clone())
            .aggregate(&records)
            .unwrap();

        let events = observer.events.lock().unwrap();
        assert_eq!(
            *events,
            vec!["partitioned 4/2/1/1".to_string(), "aggregated 2".to_string()]
        );
    }
}
