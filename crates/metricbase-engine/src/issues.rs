use serde::Serialize;
use std::fmt;

/// A non-fatal degradation observed while aggregating.
///
/// Issues never abort an aggregation: the affected cells become null or the affected rows are
/// dropped, and the issue is returned next to the result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityIssue {
    RowsWithoutPeriod { dropped: usize },
    RowsWithoutIdentity { column: String, dropped: usize },
    MissingKeyColumn { column: String },
    MissingMetricField { metric: String, field: String },
    NonNumericValues { field: String, count: usize },
    UndefinedRatio { metric: String, groups: usize },
}

impl fmt::Display for DataQualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityIssue::RowsWithoutPeriod { dropped } => {
                write!(f, "dropped {dropped} row(s) with a null period")
            }
            DataQualityIssue::RowsWithoutIdentity { column, dropped } => {
                write!(f, "dropped {dropped} row(s) with a null `{column}`")
            }
            DataQualityIssue::MissingKeyColumn { column } => {
                write!(f, "group column `{column}` is absent; filled with nulls")
            }
            DataQualityIssue::MissingMetricField { metric, field } => {
                write!(f, "metric `{metric}` reads absent field `{field}`; result is null")
            }
            DataQualityIssue::NonNumericValues { field, count } => {
                write!(f, "ignored {count} non-numeric value(s) in `{field}`")
            }
            DataQualityIssue::UndefinedRatio { metric, groups } => {
                write!(
                    f,
                    "metric `{metric}` is undefined for {groups} group(s) (null or zero denominator)"
                )
            }
        }
    }
}

/// Collects issues for one aggregation unit and logs each one as it is recorded.
#[derive(Debug, Default)]
pub(crate) struct IssueLog {
    scope: String,
    issues: Vec<DataQualityIssue>,
}

impl IssueLog {
    pub(crate) fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            issues: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, issue: DataQualityIssue) {
        log::warn!("[{}] {issue}", self.scope);
        self.issues.push(issue);
    }

    pub(crate) fn into_vec(self) -> Vec<DataQualityIssue> {
        self.issues
    }
}
