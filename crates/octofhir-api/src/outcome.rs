use serde::{Deserialize, Serialize};

/// Minimal FHIR OperationOutcome representation for API error responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationOutcome {
    #[serde(rename = "resourceType")]
    pub resource_type: String, // always "OperationOutcome"
    pub issue: Vec<OperationOutcomeIssue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationOutcomeIssue {
    /// FHIR issue severity: fatal | error | warning | information
    pub severity: String,
    /// FHIR issue type code: invalid | not-found | deleted | conflict | processing | not-supported | exception
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    /// FHIRPath-ish location of the problem, e.g. the failing search parameter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expression: Vec<String>,
}

impl OperationOutcome {
    pub fn single(severity: &str, code: &str, diagnostics: impl Into<String>) -> Self {
        Self {
            resource_type: "OperationOutcome".to_string(),
            issue: vec![OperationOutcomeIssue {
                severity: severity.to_string(),
                code: code.to_string(),
                diagnostics: Some(diagnostics.into()),
                expression: Vec::new(),
            }],
        }
    }

    /// Create an OperationOutcome with one warning per message.
    pub fn warnings(messages: Vec<String>) -> Self {
        Self {
            resource_type: "OperationOutcome".to_string(),
            issue: messages
                .into_iter()
                .map(|msg| OperationOutcomeIssue {
                    severity: "warning".to_string(),
                    code: "not-supported".to_string(),
                    diagnostics: Some(msg),
                    expression: Vec::new(),
                })
                .collect(),
        }
    }

    /// Attaches an expression to every issue.
    #[must_use]
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        let expression = expression.into();
        for issue in &mut self.issue {
            issue.expression.push(expression.clone());
        }
        self
    }

    pub fn has_issues(&self) -> bool {
        !self.issue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_serializes_as_fhir() {
        let outcome = OperationOutcome::single("error", "not-found", "Basic/1 not found");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "resourceType": "OperationOutcome",
                "issue": [{"severity": "error", "code": "not-found", "diagnostics": "Basic/1 not found"}]
            })
        );
    }

    #[test]
    fn test_expression_and_warnings() {
        let outcome =
            OperationOutcome::single("error", "invalid", "bad date").with_expression("date");
        assert_eq!(outcome.issue[0].expression, vec!["date".to_string()]);

        let warnings = OperationOutcome::warnings(vec!["a".into(), "b".into()]);
        assert!(warnings.has_issues());
        assert_eq!(warnings.issue.len(), 2);
        assert_eq!(warnings.issue[1].severity, "warning");
    }
}
