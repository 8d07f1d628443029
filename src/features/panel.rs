//! Load the raw monthly transaction panel
//!
//! The panel is produced by an external generator. Its column contract is
//! fixed; the customer-level survival targets are repeated on every monthly
//! row and are only required by the feature aggregation stage.

use crate::error::PipelineResult;
use crate::store::Table;

/// Columns every consumer of the raw panel requires
pub const PANEL_COLUMNS: [&str; 9] = [
    "customer_id",
    "month",
    "age",
    "income",
    "balance",
    "card_spend",
    "utilization",
    "pix_count",
    "late_payment",
];

/// Customer-level survival target columns carried on the raw panel
pub const TARGET_COLUMNS: [&str; 2] = ["time_to_investment", "event_investment"];

/// Survival targets as repeated on one monthly row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurvivalTarget {
    pub time_to_investment: i64,
    pub event: i64,
}

/// One (customer, month) row of the raw panel
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyObservation {
    pub customer_id: i64,
    pub month: i64,
    pub age: f64,
    pub income: f64,
    pub balance: f64,
    pub card_spend: f64,
    pub utilization: f64,
    pub pix_count: f64,
    pub late_payment: f64,
    pub target: Option<SurvivalTarget>,
}

/// Strictly parse every row; any unparsable mandatory cell aborts the load
pub fn load_panel_with_targets(table: &Table) -> PipelineResult<Vec<MonthlyObservation>> {
    let mut required: Vec<&str> = PANEL_COLUMNS.to_vec();
    required.extend(TARGET_COLUMNS);
    table.require(&required)?;

    let ids = table.integer("customer_id")?;
    let months = table.integer("month")?;
    let durations = table.integer("time_to_investment")?;
    let events = table.integer("event_investment")?;
    let metrics = MetricColumns::strict(table)?;

    Ok((0..table.len())
        .map(|i| {
            let mut obs = metrics.observation(i, ids[i], months[i]);
            obs.target = Some(SurvivalTarget {
                time_to_investment: durations[i],
                event: events[i],
            });
            obs
        })
        .collect())
}

/// Load rows for monthly state assignment
///
/// Rows whose customer id or month cannot be read are dropped with a warning
/// before any metric is parsed; metrics of the kept rows must parse. The
/// remaining rows are sorted by (customer_id, month).
pub fn load_monthly_rows(table: &Table) -> PipelineResult<Vec<MonthlyObservation>> {
    table.require(&PANEL_COLUMNS)?;

    let ids = table.integer_lenient("customer_id")?;
    let months = table.integer_lenient("month")?;
    let keyed: Vec<(usize, i64, i64)> = (0..table.len())
        .filter_map(|i| match (ids[i], months[i]) {
            (Some(id), Some(month)) => Some((i, id, month)),
            _ => None,
        })
        .collect();

    let dropped = table.len() - keyed.len();
    if dropped > 0 {
        log::warn!("dropped {} panel rows with unreadable customer_id/month", dropped);
    }

    let kept: Vec<usize> = keyed.iter().map(|&(i, _, _)| i).collect();
    let metrics = MetricColumns::strict_rows(table, &kept)?;
    let mut rows: Vec<MonthlyObservation> = keyed
        .iter()
        .enumerate()
        .map(|(pos, &(_, id, month))| metrics.observation(pos, id, month))
        .collect();

    rows.sort_by_key(|r| (r.customer_id, r.month));
    Ok(rows)
}

struct MetricColumns {
    age: Vec<f64>,
    income: Vec<f64>,
    balance: Vec<f64>,
    card_spend: Vec<f64>,
    utilization: Vec<f64>,
    pix_count: Vec<f64>,
    late_payment: Vec<f64>,
}

impl MetricColumns {
    fn strict(table: &Table) -> PipelineResult<Self> {
        Ok(Self {
            age: table.required_numeric("age")?,
            income: table.required_numeric("income")?,
            balance: table.required_numeric("balance")?,
            card_spend: table.required_numeric("card_spend")?,
            utilization: table.required_numeric("utilization")?,
            pix_count: table.required_numeric("pix_count")?,
            late_payment: table.required_numeric("late_payment")?,
        })
    }

    /// Values of `rows` only; `observation` then indexes by position in `rows`
    fn strict_rows(table: &Table, rows: &[usize]) -> PipelineResult<Self> {
        Ok(Self {
            age: table.required_numeric_rows("age", rows)?,
            income: table.required_numeric_rows("income", rows)?,
            balance: table.required_numeric_rows("balance", rows)?,
            card_spend: table.required_numeric_rows("card_spend", rows)?,
            utilization: table.required_numeric_rows("utilization", rows)?,
            pix_count: table.required_numeric_rows("pix_count", rows)?,
            late_payment: table.required_numeric_rows("late_payment", rows)?,
        })
    }

    fn observation(&self, i: usize, customer_id: i64, month: i64) -> MonthlyObservation {
        MonthlyObservation {
            customer_id,
            month,
            age: self.age[i],
            income: self.income[i],
            balance: self.balance[i],
            card_spend: self.card_spend[i],
            utilization: self.utilization[i],
            pix_count: self.pix_count[i],
            late_payment: self.late_payment[i],
            target: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    const HEADER: &str = "customer_id,month,age,income,balance,card_spend,utilization,pix_count,late_payment,time_to_investment,event_investment";

    #[test]
    fn test_load_with_targets() {
        let csv = format!("{}\n7,1,30,5000,100.5,20,0.4,12,0,12,0\n", HEADER);
        let table = Table::from_reader("panel", csv.as_bytes()).unwrap();
        let rows = load_panel_with_targets(&table).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].customer_id, 7);
        assert_eq!(rows[0].balance, 100.5);
        assert_eq!(
            rows[0].target,
            Some(SurvivalTarget { time_to_investment: 12, event: 0 })
        );
    }

    #[test]
    fn test_missing_columns_all_listed() {
        let csv = "customer_id,month,age\n1,1,30\n";
        let table = Table::from_reader("panel", csv.as_bytes()).unwrap();
        match load_monthly_rows(&table) {
            Err(PipelineError::SchemaViolation { missing, .. }) => {
                assert_eq!(missing.len(), 6);
                assert!(missing.contains(&"late_payment".to_string()));
            }
            other => panic!("expected schema violation, got {:?}", other),
        }
    }

    #[test]
    fn test_monthly_rows_drop_bad_keys_and_sort() {
        let csv = format!(
            "{}\n2,2,30,5000,1,1,0.1,1,0,12,0\n2,1,30,5000,1,1,0.1,1,0,12,0\nx,1,30,5000,1,1,0.1,1,0,12,0\n",
            HEADER
        );
        let table = Table::from_reader("panel", csv.as_bytes()).unwrap();
        let rows = load_monthly_rows(&table).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].customer_id, rows[0].month), (2, 1));
        assert_eq!((rows[1].customer_id, rows[1].month), (2, 2));
    }

    #[test]
    fn test_junk_row_with_blank_metric_is_dropped() {
        let csv = format!(
            "{}\n3,1,30,5000,1,1,0.1,1,0,12,0\n,,30,,1,1,0.1,1,0,12,0\nabc,2,,5000,,1,0.1,1,0,12,0\n",
            HEADER
        );
        let table = Table::from_reader("panel", csv.as_bytes()).unwrap();
        let rows = load_monthly_rows(&table).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].customer_id, rows[0].income), (3, 5000.0));
    }

    #[test]
    fn test_kept_row_with_blank_metric_still_fails() {
        let csv = format!("{}\n3,1,30,,1,1,0.1,1,0,12,0\n", HEADER);
        let table = Table::from_reader("panel", csv.as_bytes()).unwrap();
        assert!(matches!(
            load_monthly_rows(&table),
            Err(PipelineError::InvalidValue { row: 0, .. })
        ));
    }
}
