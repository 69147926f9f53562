use crate::models::RiskLevel::{self, High, Low, Medium};

/// Overall risk indexed by `[frequency][severity]`, both ordered Low, Medium, High.
const RISK_MATRIX: [[RiskLevel; 3]; 3] = [
    [Low, Low, Medium],
    [Low, Medium, High],
    [Medium, High, High],
];

fn index(level: RiskLevel) -> usize {
    match level {
        Low => 0,
        Medium => 1,
        High => 2,
    }
}

/// Derives the overall risk of a (frequency, severity) pair. Missing or
/// unrecognized inputs classify as `Low`.
pub fn classify(frequency: Option<&str>, severity: Option<&str>) -> RiskLevel {
    let (Some(frequency), Some(severity)) = (
        frequency.and_then(RiskLevel::parse),
        severity.and_then(RiskLevel::parse),
    ) else {
        return Low;
    };
    RISK_MATRIX[index(frequency)][index(severity)]
}
