/// Where a renamed field-option value has to be rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationTarget {
    /// Same-named column on `initiatives`.
    InitiativeColumn(&'static str),
    /// `initiative_departments.department`.
    DepartmentTag,
}

/// Fields whose option values are stored on other rows. Anything missing
/// from this table only renames the option row itself.
const PROPAGATION: [(&str, PropagationTarget); 6] = [
    ("benefit", PropagationTarget::InitiativeColumn("benefit")),
    (
        "strategic_objective",
        PropagationTarget::InitiativeColumn("strategic_objective"),
    ),
    ("status", PropagationTarget::InitiativeColumn("status")),
    ("priority", PropagationTarget::InitiativeColumn("priority")),
    ("risk_level", PropagationTarget::InitiativeColumn("risk_level")),
    ("department", PropagationTarget::DepartmentTag),
];

impl PropagationTarget {
    pub fn for_field(field_name: &str) -> Option<Self> {
        PROPAGATION
            .iter()
            .find(|(field, _)| *field == field_name)
            .map(|(_, target)| *target)
    }
}

/// A rename propagates only between two distinct non-empty values.
pub fn needs_propagation(old_value: &str, new_value: &str) -> bool {
    let old_value = old_value.trim();
    let new_value = new_value.trim();
    !old_value.is_empty() && !new_value.is_empty() && old_value != new_value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initiative_fields_map_to_their_column() {
        for field in ["benefit", "strategic_objective", "status", "priority", "risk_level"] {
            assert_eq!(
                PropagationTarget::for_field(field),
                Some(PropagationTarget::InitiativeColumn(field))
            );
        }
        assert_eq!(
            PropagationTarget::for_field("department"),
            Some(PropagationTarget::DepartmentTag)
        );
    }

    #[test]
    fn unmapped_fields_do_not_propagate() {
        assert_eq!(PropagationTarget::for_field("metric_type"), None);
        assert_eq!(PropagationTarget::for_field("health_status"), None);
        assert_eq!(PropagationTarget::for_field("Status"), None);
    }

    #[test]
    fn propagation_needs_two_distinct_values() {
        assert!(needs_propagation("Draft", "Ideation"));
        assert!(!needs_propagation("Draft", "Draft"));
        assert!(!needs_propagation("", "Ideation"));
        assert!(!needs_propagation("Draft", "  "));
    }
}
