//! Simulated code analysis backend.

use std::time::Duration;

use async_trait::async_trait;
use panel_bridge::{Envelope, HandlerResult, Reply, ReplyError, RequestHandler, Responder};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{ANALYSIS_ERROR, ANALYSIS_RESULT};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub line: u32,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub complexity: u32,
    pub coverage: &'static str,
    pub lines_of_code: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub report: String,
    pub issues: Vec<Issue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
}

/// Produces the canned outcome for `code`.
///
/// Code mentioning "error" fails with a simulated server error, code
/// mentioning "empty" yields a clean report, anything else a report with
/// two issues and metrics. Matching is case-insensitive.
pub fn simulate_analysis(code: &str) -> Result<AnalysisReport, Value> {
    let lowered = code.to_lowercase();
    if lowered.contains("error") {
        return Err(json!({
            "message": "Simulated: Analysis API returned an error.",
            "details": {
                "statusCode": 500,
                "message": "Internal Server Error simulation during analysis.",
            },
        }));
    }
    if lowered.contains("empty") {
        return Ok(AnalysisReport {
            report: "Simulated: Analysis complete. No significant issues found.".to_string(),
            issues: Vec::new(),
            metrics: None,
        });
    }
    Ok(AnalysisReport {
        report: format!(
            "Simulated: Analysis completed successfully for {} characters.",
            code.chars().count()
        ),
        issues: vec![
            Issue {
                line: 10,
                kind: "warning",
                message: "Potential null pointer dereference (simulated).",
            },
            Issue {
                line: 25,
                kind: "info",
                message: "Unused variable detected (simulated).",
            },
        ],
        metrics: Some(Metrics {
            complexity: 42,
            coverage: "75%",
            lines_of_code: code.split('\n').count(),
        }),
    })
}

#[derive(Debug, Clone, Copy)]
pub struct RunAnalysis {
    delay: Duration,
}

impl RunAnalysis {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl RequestHandler for RunAnalysis {
    async fn handle(&self, request: &Envelope, _responder: &Responder) -> HandlerResult {
        let Some(code) = request
            .payload
            .as_ref()
            .and_then(|payload| payload.get("codeToAnalyze"))
            .and_then(Value::as_str)
        else {
            return Err(ReplyError::message(
                ANALYSIS_ERROR,
                "Invalid payload for runAnalysis: codeToAnalyze must be a string.",
            ));
        };

        debug!(chars = code.len(), "running simulated analysis");
        tokio::time::sleep(self.delay).await;
        let report = simulate_analysis(code)
            .map_err(|error| ReplyError::new(ANALYSIS_ERROR, error))?;
        let payload = serde_json::to_value(report)
            .map_err(|err| ReplyError::message(ANALYSIS_ERROR, err.to_string()))?;
        Ok(Some(Reply::new(ANALYSIS_RESULT, payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[test]
    fn error_keyword_fails_with_details() {
        let err = simulate_analysis("throw new ERROR()").unwrap_err();
        assert_eq!(err["details"]["statusCode"], 500);
    }

    #[test]
    fn empty_keyword_has_no_issues() {
        let report = simulate_analysis("an Empty module").unwrap();
        expect![[r#"{"report":"Simulated: Analysis complete. No significant issues found.","issues":[]}"#]]
            .assert_eq(&serde_json::to_string(&report).unwrap());
    }

    #[test]
    fn other_code_reports_issues_and_metrics() {
        let report = simulate_analysis("let x = 1;\nlet y = 2;").unwrap();
        assert_eq!(report.issues.len(), 2);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json["report"],
            "Simulated: Analysis completed successfully for 21 characters."
        );
        assert_eq!(json["issues"][0]["type"], "warning");
        assert_eq!(
            json["metrics"],
            json!({ "complexity": 42, "coverage": "75%", "linesOfCode": 2 })
        );
    }

    #[test]
    fn error_takes_precedence_over_empty() {
        assert!(simulate_analysis("empty error").is_err());
    }
}
