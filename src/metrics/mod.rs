pub mod aggregate;
pub mod merge;

pub use aggregate::{aggregate, metric_drilldown, monthly_trends, period_drilldown, DrilldownFilter};
pub use merge::{decode_metrics, encode_metrics, fixed_readings, merge, normalize_names, FIXED_METRIC_COLUMNS};
