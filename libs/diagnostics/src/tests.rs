use crate::*;

#[derive(Debug, Clone)]
pub struct TestIssue {
    severity: Severity,
    at: Vec<Point>,
}

impl Display for TestIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unmatched geometry")
    }
}

impl Diagnostic for TestIssue {
    fn severity(&self) -> Severity {
        self.severity
    }

    fn locations(&self) -> Vec<Point> {
        self.at.clone()
    }
}

impl From<Severity> for TestIssue {
    fn from(severity: Severity) -> Self {
        Self {
            severity,
            at: Vec::new(),
        }
    }
}

#[test]
fn issue_set_counters() {
    let mut issues: IssueSet<TestIssue> = IssueSet::new();
    issues.add(Severity::Info.into());
    assert_eq!(issues.num_errors(), 0);
    assert_eq!(issues.num_warnings(), 0);
    assert!(!issues.has_error());
    assert!(!issues.has_warning());
    issues.add(Severity::Warning.into());
    assert_eq!(issues.num_warnings(), 1);
    assert!(issues.has_warning());
    issues.add(Severity::Error.into());
    assert_eq!(issues.num_errors(), 1);
    assert!(issues.has_error());
    assert_eq!(issues.len(), 3);
}

#[test]
fn at_least_filters_by_severity() {
    let mut issues: IssueSet<TestIssue> = IssueSet::new();
    issues.add(Severity::Info.into());
    issues.add(Severity::Warning.into());
    issues.add(Severity::Error.into());
    assert_eq!(issues.at_least(Severity::Warning).count(), 2);
    assert_eq!(issues.at_least(Severity::Info).count(), 3);
}

#[test]
fn extend_preserves_counters() {
    let mut a: IssueSet<TestIssue> = IssueSet::new();
    a.add(Severity::Error.into());
    let mut b: IssueSet<TestIssue> = IssueSet::new();
    b.add(Severity::Warning.into());
    b.add(Severity::Error.into());
    a.extend(b);
    assert_eq!(a.num_errors(), 2);
    assert_eq!(a.num_warnings(), 1);
}

#[test]
fn display_includes_locations() {
    let mut issues: IssueSet<TestIssue> = IssueSet::new();
    issues.add(TestIssue {
        severity: Severity::Warning,
        at: vec![Point::new(1, 2), Point::new(3, 4)],
    });
    assert_eq!(
        issues.to_string(),
        "warning: unmatched geometry at (1, 2) (3, 4)\n"
    );
}

#[test]
fn default_severity_is_warning() {
    assert_eq!(Severity::default(), Severity::Warning);
}

#[test]
fn severity_as_tracing_level() {
    assert_eq!(Severity::Info.as_tracing_level(), tracing::Level::INFO);
    assert_eq!(Severity::Warning.as_tracing_level(), tracing::Level::WARN);
    assert_eq!(Severity::Error.as_tracing_level(), tracing::Level::ERROR);
}
