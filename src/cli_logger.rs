use anyhow::Result;
use flamecheck::{DiffOutcome, InvocationResponse, ProfileReport};
use serde::Serialize;
use serde_json::Value;

pub struct CliLogger {
    json: bool,
    no_color: bool,
}

impl CliLogger {
    pub fn new(json: bool, no_color: bool) -> Self {
        Self { json, no_color }
    }

    pub fn print_serialized<T: Serialize>(&self, value: &T) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(value)?);
            return Ok(());
        }

        println!("{}", self.render(&serde_json::to_value(value)?));
        Ok(())
    }

    pub fn print_response(&self, response: &InvocationResponse) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(response)?);
            return Ok(());
        }
        match response {
            InvocationResponse::Success(report) => self.print_report(report),
            InvocationResponse::Failure(failure) => {
                self.print_error(&failure.body);
                Ok(())
            }
        }
    }

    fn print_report(&self, report: &ProfileReport) -> Result<()> {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} {}\n",
            self.style("flamecheck", "36;1"),
            report.target,
            self.style("OK", "32;1")
        ));
        out.push_str(&format!("{} {}\n", self.style("title", "90"), report.title));
        for run in &report.samples {
            let marker = if run.index == report.representative { "*" } else { " " };
            out.push_str(&format!(
                "{} {marker}#{} {}us\n",
                self.style("run", "90"),
                run.index,
                run.execution_time
            ));
        }
        if let Some(timing) = &report.timing {
            out.push_str(&format!(
                "{} dom_complete={}ms load={}ms\n",
                self.style("timing", "90"),
                timing.dom_complete_ms,
                timing.load_event_ms
            ));
        }
        if let Some(prev) = &report.previous_profile {
            out.push_str(&format!("{} {prev}\n", self.style("previous", "90")));
        }
        out.push_str(&format!(
            "{} {}\n",
            self.style("stored", "90"),
            report.current_profile
        ));

        match &report.diff {
            DiffOutcome::Unavailable { reason } => {
                out.push_str(&format!("{} unavailable ({reason})\n", self.style("diff", "90")));
            }
            DiffOutcome::Compared { .. } => {
                let summary = report.diff.summary();
                out.push_str(&format!(
                    "{} slices={} total_delta={}us\n",
                    self.style("diff", "90"),
                    summary.entries,
                    summary.total_delta
                ));
                if let Some(worst) = &summary.largest_regression {
                    out.push_str(&format!(
                        "  {} {} {}us\n",
                        self.style("slower", "31;1"),
                        worst.slice_id,
                        worst.delta
                    ));
                }
                if let Some(best) = &summary.largest_improvement {
                    out.push_str(&format!(
                        "  {} {} +{}us\n",
                        self.style("faster", "32;1"),
                        best.slice_id,
                        best.delta
                    ));
                }
            }
        }

        println!("{}", out.trim_end());
        Ok(())
    }

    pub fn print_text(&self, text: &str) {
        println!("{text}");
    }

    pub fn print_error(&self, msg: &str) {
        if self.json {
            let out = serde_json::json!({
                "status": "error",
                "code": "error",
                "message": msg,
            });
            println!("{out}");
            return;
        }
        eprintln!("{} {msg}", self.style("error", "31;1"));
    }

    /// Indented key/value listing; keys are dimmed unless color is off.
    fn render(&self, value: &Value) -> String {
        let mut lines = Vec::new();
        self.render_into(value, 0, &mut lines);
        lines.join("\n")
    }

    fn render_into(&self, value: &Value, indent: usize, lines: &mut Vec<String>) {
        let pad = " ".repeat(indent);
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (key, item) in map {
                    let key = self.style(key, "90");
                    match scalar(item) {
                        Some(text) => lines.push(format!("{pad}{key}: {text}")),
                        None => {
                            lines.push(format!("{pad}{key}:"));
                            self.render_into(item, indent + 2, lines);
                        }
                    }
                }
            }
            Value::Array(items) if !items.is_empty() => {
                for item in items {
                    match scalar(item) {
                        Some(text) => lines.push(format!("{pad}- {text}")),
                        None => {
                            lines.push(format!("{pad}-"));
                            self.render_into(item, indent + 2, lines);
                        }
                    }
                }
            }
            other => lines.push(format!("{pad}{}", scalar(other).unwrap_or_default())),
        }
    }

    fn style(&self, text: &str, ansi: &str) -> String {
        if self.no_color {
            return text.to_string();
        }
        format!("\x1b[{ansi}m{text}\x1b[0m")
    }
}

/// Inline form of a value, or `None` when it needs its own block.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some("null".to_string()),
        Value::Bool(v) => Some(v.to_string()),
        Value::Number(v) => Some(v.to_string()),
        Value::String(v) => Some(v.clone()),
        Value::Array(items) if items.is_empty() => Some("[]".to_string()),
        Value::Object(map) if map.is_empty() => Some("{}".to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}
