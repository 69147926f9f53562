use crate::metrics::merge::decode_metrics;
use crate::models::{
    DashboardFilterQuery, InitiativeMetricRow, MetricAggregate, MetricDrilldown, MetricInitiative, PeriodDrilldown,
    PeriodInitiative, PeriodMetricRow, TrendPoint,
};
use std::collections::{BTreeMap, BTreeSet};

/// Optional initiative-id allow-list and exact initiative-type match, shared
/// by the trend view and both drill-downs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrilldownFilter {
    initiative_ids: BTreeSet<i64>,
    initiative_type: Option<String>,
}

impl DrilldownFilter {
    /// Ids that do not parse are dropped; an empty list means no id filter.
    pub fn from_query(query: &DashboardFilterQuery) -> Self {
        let initiative_ids = query
            .initiative_ids
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .filter_map(|id| id.trim().parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default();
        let initiative_type = query
            .initiative_type
            .as_deref()
            .filter(|kind| !kind.trim().is_empty())
            .map(ToString::to_string);

        Self {
            initiative_ids,
            initiative_type,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.initiative_ids.is_empty() && self.initiative_type.is_none()
    }

    pub fn matches(&self, initiative_id: i64, initiative_type: Option<&str>) -> bool {
        if !self.initiative_ids.is_empty() && !self.initiative_ids.contains(&initiative_id) {
            return false;
        }
        match self.initiative_type.as_deref() {
            Some(expected) => initiative_type == Some(expected),
            None => true,
        }
    }
}

#[derive(Debug, Default)]
struct PeriodAccumulator {
    initiatives: BTreeSet<i64>,
    sums: BTreeMap<String, (f64, u64)>,
}

/// Collapses per-initiative rows into one trend point per period, ascending.
///
/// Every initiative with a row in the period counts as active, even when its
/// blob is empty or undecodable. Values that are neither numbers nor numeric
/// strings are skipped, so a metric's count only covers contributing rows.
pub fn aggregate<'a, I>(rows: I) -> Vec<TrendPoint>
where
    I: IntoIterator<Item = &'a PeriodMetricRow>,
{
    let mut periods: BTreeMap<&'a str, PeriodAccumulator> = BTreeMap::new();

    for row in rows {
        let period = periods.entry(row.metric_period.as_str()).or_default();
        period.initiatives.insert(row.initiative_id);

        for (name, metric) in decode_metrics(row.additional_metrics.as_deref()) {
            let Some(value) = numeric_value(&metric.value) else {
                continue;
            };
            let (total, count) = period.sums.entry(name).or_insert((0.0, 0));
            *total += value;
            *count += 1;
        }
    }

    periods
        .into_iter()
        .map(|(period, accumulator)| TrendPoint {
            metric_period: period.to_string(),
            active_initiatives: accumulator.initiatives.len(),
            metrics: accumulator
                .sums
                .into_iter()
                .map(|(name, (total, count))| {
                    let aggregate = MetricAggregate {
                        total: round2(total),
                        avg: round2(total / count as f64),
                        count,
                    };
                    (name, aggregate)
                })
                .collect(),
        })
        .collect()
}

/// Filtered trend view over the raw period rows.
pub fn monthly_trends(rows: &[PeriodMetricRow], filter: &DrilldownFilter) -> Vec<TrendPoint> {
    aggregate(
        rows.iter()
            .filter(|row| filter.matches(row.initiative_id, row.initiative_type.as_deref())),
    )
}

/// Every initiative reporting in `period` with its own metrics map, sorted
/// by initiative name. An undecodable blob shows as an empty map.
pub fn period_drilldown(period: &str, rows: &[InitiativeMetricRow], filter: &DrilldownFilter) -> PeriodDrilldown {
    let mut initiatives = rows
        .iter()
        .filter(|row| row.metric_period == period)
        .filter(|row| filter.matches(row.initiative_id, row.initiative_type.as_deref()))
        .map(|row| PeriodInitiative {
            id: row.initiative_id,
            use_case_name: row.use_case_name.clone(),
            status: row.status.clone(),
            health_status: row.health_status.clone(),
            percentage_complete: row.percentage_complete,
            departments: row.departments.clone(),
            metrics: decode_metrics(row.additional_metrics.as_deref()),
        })
        .collect::<Vec<_>>();
    initiatives.sort_by(|left, right| {
        left.use_case_name
            .cmp(&right.use_case_name)
            .then(left.id.cmp(&right.id))
    });

    PeriodDrilldown {
        period: period.to_string(),
        initiatives,
    }
}

/// Per-period list of initiatives whose blob carries `metric_name`.
pub fn metric_drilldown(metric_name: &str, rows: &[InitiativeMetricRow], filter: &DrilldownFilter) -> MetricDrilldown {
    let mut by_period: BTreeMap<String, Vec<MetricInitiative>> = BTreeMap::new();

    for row in rows {
        if !filter.matches(row.initiative_id, row.initiative_type.as_deref()) {
            continue;
        }
        let mut metrics = decode_metrics(row.additional_metrics.as_deref());
        let Some(metric) = metrics.remove(metric_name) else {
            continue;
        };
        by_period
            .entry(row.metric_period.clone())
            .or_default()
            .push(MetricInitiative {
                id: row.initiative_id,
                use_case_name: row.use_case_name.clone(),
                departments: row.departments.clone(),
                value: metric.value,
                comments: metric.comments,
            });
    }

    for initiatives in by_period.values_mut() {
        initiatives.sort_by(|left, right| {
            left.use_case_name
                .cmp(&right.use_case_name)
                .then(left.id.cmp(&right.id))
        });
    }

    MetricDrilldown {
        metric_name: metric_name.to_string(),
        by_period,
    }
}

fn numeric_value(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|number| number.is_finite())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
