//! Output formatters for run reports
//!
//! Provides JSON, Table, and summary output formats.

use crate::results::{ReportModel, TargetView, TestView};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format a whole report
    pub fn format_report(&self, report: &ReportModel) -> String {
        match self.format {
            OutputFormat::Table => self.format_report_table(report),
            OutputFormat::Json => serde_json::to_string(report).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Summary => self.format_report_brief(report),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if self.colorize {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn status_label(&self, status: &str) -> String {
        match status {
            "pass" => self.paint("✓ PASS", "32"),
            "fail" => self.paint("✗ FAIL", "31"),
            _ => self.paint("! ERROR", "31"),
        }
    }

    fn format_report_table(&self, report: &ReportModel) -> String {
        let mut output = String::new();

        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!("║  {:58}  ║\n", report.title));
        output.push_str(&format!("║  Run {:55}  ║\n", report.run_id));
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        for target in &report.targets {
            output.push_str(&format!("║  {:58}  ║\n", self.target_line(target)));
        }
        if report.targets.is_empty() {
            output.push_str(&format!("║  {:58}  ║\n", "No targets"));
        }

        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        output.push_str(&format!(
            "║  Total: {:4} | Pass: {:4} | Fail: {:4} | Faults: {:3}          ║\n",
            report.total_tests, report.total_success, report.total_failure, report.total_faults
        ));
        output.push_str(&format!("║  Elapsed: {:50}  ║\n", report.elapsed));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        let failures: Vec<&TestView> = report
            .targets
            .iter()
            .flat_map(|t| t.tests.iter())
            .filter(|t| t.status != "pass")
            .collect();
        if !failures.is_empty() {
            output.push_str("\n Failures:\n");
            for test in failures {
                output.push_str(&format!(
                    "   {} {}#{} on {}\n",
                    self.status_label(&test.status),
                    test.class_name,
                    test.method_name,
                    test.target
                ));
                if let Some(trace) = &test.failure {
                    output.push_str(&format!("       {}\n", trace.title));
                }
            }
        }

        let inconsistent: Vec<String> = report
            .classes
            .iter()
            .flat_map(|class| {
                class
                    .tests
                    .iter()
                    .filter(|t| t.passed_on > 0 && t.failed_on > 0)
                    .map(move |t| {
                        format!(
                            "{}#{} ({} passed, {} failed)",
                            class.class_name, t.method_name, t.passed_on, t.failed_on
                        )
                    })
            })
            .collect();
        if !inconsistent.is_empty() {
            output.push_str("\n Inconsistent across targets:\n");
            for line in inconsistent.iter().take(10) {
                output.push_str(&format!("   - {line}\n"));
            }
        }

        let faults: Vec<&TargetView> = report.targets.iter().filter(|t| t.fault.is_some()).collect();
        if !faults.is_empty() {
            output.push_str("\n Target faults:\n");
            for target in faults {
                output.push_str(&format!(
                    "   {} {}\n",
                    self.paint(&target.target, "33"),
                    target.fault.as_deref().unwrap_or_default()
                ));
            }
        }

        if let Some(exception) = &report.exception {
            output.push_str(&format!("\n {}\n", self.paint(exception, "31")));
        }

        output
    }

    fn target_line(&self, target: &TargetView) -> String {
        let marker = if target.fault.is_some() {
            "!"
        } else if target.tests_failed > 0 {
            "✗"
        } else {
            "✓"
        };
        format!(
            "{} {:20} {:>10} {:>4} failed",
            marker, target.name, target.tests_run, target.tests_failed
        )
    }

    fn format_report_brief(&self, report: &ReportModel) -> String {
        let verdict = if report.success {
            self.paint("PASSED", "32")
        } else {
            self.paint("FAILED", "31")
        };
        format!(
            "{} {}: {}/{} passed on {} targets, {} faults in {}",
            verdict,
            report.title,
            report.total_success,
            report.total_tests,
            report.total_targets,
            report.total_faults,
            report.elapsed
        )
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}
