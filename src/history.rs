//! Query-time reshaping of stored snapshots into chart-ready series.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::models::{CalendarStamp, Snapshot};

/// Summary metadata over a queried range: the peak total value and when it
/// occurred. Ties keep the earliest snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartMeta {
    #[serde(rename = "highestValue")]
    pub highest_value: f64,
    #[serde(rename = "highestTime")]
    pub highest_time: i64,
}

/// A balance as exposed to the chart: quantities collapse to `total`, and the
/// share of the portfolio is attached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartBalance {
    pub total: f64,
    pub price: f64,
    pub value: f64,
    pub percentage: f64,
}

/// One snapshot rewritten for charting: every asset's value is additionally
/// flattened to a top-level key so plotting libraries can address series by
/// asset code.
#[derive(Debug, Clone, Serialize)]
pub struct ChartPoint {
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
    pub user: String,
    #[serde(rename = "timeStamp")]
    pub time_stamp: i64,
    pub time: CalendarStamp,
    pub value: f64,
    pub balances: BTreeMap<String, ChartBalance>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartSeries {
    pub keys: Vec<String>,
    pub history: Vec<ChartPoint>,
    pub meta: ChartMeta,
}

/// Reshapes a snapshot sequence (ascending by timestamp) into chart series.
///
/// `keys` collects every asset code observed across the range in order of
/// first appearance. The peak comparison is strictly greater, so among equal
/// totals the earliest snapshot wins. Percentages divide by the snapshot
/// total without a zero guard; a zero-value snapshot yields non-finite
/// percentages, which serialize as JSON null.
pub fn format_history(snapshots: Vec<Snapshot>) -> ChartSeries {
    let mut meta = ChartMeta {
        highest_value: 0.0,
        highest_time: 0,
    };
    let mut keys: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let history = snapshots
        .into_iter()
        .map(|snapshot| {
            if snapshot.value > meta.highest_value {
                meta.highest_value = snapshot.value;
                meta.highest_time = snapshot.time_stamp;
            }

            let mut values = BTreeMap::new();
            let mut balances = BTreeMap::new();

            for (code, balance) in &snapshot.balances {
                if seen.insert(code.clone()) {
                    keys.push(code.clone());
                }
                values.insert(code.clone(), balance.value);
                balances.insert(
                    code.clone(),
                    ChartBalance {
                        total: balance.total,
                        price: balance.price,
                        value: balance.value,
                        percentage: balance.value / snapshot.value * 100.0,
                    },
                );
            }

            ChartPoint {
                values,
                user: snapshot.user,
                time_stamp: snapshot.time_stamp,
                time: snapshot.time,
                value: snapshot.value,
                balances,
            }
        })
        .collect();

    ChartSeries { keys, history, meta }
}
