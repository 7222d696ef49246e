use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{Answer, OutputFormat, ScoredEntry};
use crate::services::{BuildStats, IndexManifest, MetricsSummary};
use crate::utils::text::{preview, truncate_chars};

/// Separator placed between retrieved passages.
pub const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Characters of the best passage shown in brief mode.
pub const BRIEF_CHARS: usize = 120;

pub trait Formatter {
    fn format_answer(&self, answer: &Answer, brief: bool) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_index_report(&self, report: &IndexReport) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub data_dir: String,
    pub index_dir: String,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub index: Option<IndexManifest>,
    /// Why no manifest could be read, when `index` is `None`
    pub index_error: Option<String>,
    pub metrics: Option<MetricsSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub location: String,
    pub entries: usize,
    #[serde(flatten)]
    pub stats: BuildStats,
}

/// Heading for brief answers, picked from keywords in the question.
/// Only affects presentation; retrieval never sees it.
pub fn brief_heading(question: &str) -> &'static str {
    let q = question.to_lowercase();
    if q.contains("leave") || q.contains("annual") {
        "LEAVE POLICY"
    } else if q.contains("sick") {
        "SICK LEAVE"
    } else if q.contains("health") || q.contains("benefit") {
        "BENEFITS"
    } else {
        "FOUND"
    }
}

fn join_passages(entries: &[ScoredEntry]) -> String {
    entries
        .iter()
        .map(|e| e.text.trim())
        .collect::<Vec<_>>()
        .join(PASSAGE_SEPARATOR)
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_answer(&self, answer: &Answer, brief: bool) -> String {
        let result = match answer {
            Answer::NoAnswer { reason, .. } => return format!("{}\n", reason.message()),
            Answer::Found { result, .. } => result,
        };

        let mut output = String::new();
        if brief {
            if let Some(best) = result.best() {
                writeln!(output, "{}:", brief_heading(answer.question())).unwrap();
                writeln!(output, "{}", truncate_chars(best.text.trim(), BRIEF_CHARS)).unwrap();
                writeln!(output, "\nSource: {}", best.source()).unwrap();
            }
            return output;
        }

        writeln!(output, "{}", join_passages(&result.entries)).unwrap();
        writeln!(output, "\nSources:").unwrap();
        for (i, entry) in result.entries.iter().enumerate() {
            writeln!(
                output,
                "  {}. {} [distance: {:.3}]",
                i + 1,
                entry.source(),
                entry.distance
            )
            .unwrap();
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();
        writeln!(output, "Data dir:      {}", status.data_dir).unwrap();
        writeln!(output, "Index dir:     {}", status.index_dir).unwrap();
        writeln!(
            output,
            "Embedding:     {} ({})",
            status.embedding_model, status.embedding_provider
        )
        .unwrap();
        writeln!(output).unwrap();

        match &status.index {
            Some(manifest) => {
                writeln!(output, "Index:         [READY]").unwrap();
                writeln!(output, "  Entries:     {}", manifest.count).unwrap();
                writeln!(output, "  Model:       {}", manifest.model_id).unwrap();
                writeln!(output, "  Dimension:   {}", manifest.dimension).unwrap();
                writeln!(output, "  Metric:      {}", manifest.metric).unwrap();
                writeln!(
                    output,
                    "  Built:       {}",
                    manifest.built_at.format("%Y-%m-%d %H:%M:%S UTC")
                )
                .unwrap();
            }
            None => {
                writeln!(output, "Index:         [MISSING]").unwrap();
                if let Some(ref reason) = status.index_error {
                    writeln!(output, "  Reason:      {}", reason).unwrap();
                }
            }
        }

        if let Some(ref m) = status.metrics {
            writeln!(output).unwrap();
            writeln!(output, "Queries:       {}", m.total_queries).unwrap();
            writeln!(output, "  Avg Latency: {}ms", m.avg_latency_ms).unwrap();
            writeln!(output, "  No Answer:   {:.1}%", m.no_answer_rate).unwrap();
            if m.error_rate > 0.0 {
                writeln!(output, "  Error Rate:  {:.1}%", m.error_rate).unwrap();
            }
        }

        output
    }

    fn format_index_report(&self, report: &IndexReport) -> String {
        let stats = &report.stats;
        let mut output = String::new();
        writeln!(output, "Indexing Complete").unwrap();
        writeln!(output, "-----------------").unwrap();
        writeln!(output, "Documents loaded: {}", stats.documents).unwrap();
        writeln!(output, "Empty documents: {}", stats.empty_documents).unwrap();
        writeln!(output, "Chunks indexed: {}", stats.chunks).unwrap();
        writeln!(output, "Blank chunks skipped: {}", stats.skipped_chunks).unwrap();
        writeln!(output, "Index entries: {}", report.entries).unwrap();
        writeln!(output, "Location: {}", report.location).unwrap();
        writeln!(output, "Duration: {}ms", stats.duration_ms).unwrap();
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        let mut output =
            rendered.unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string());
        output.push('\n');
        output
    }
}

impl Formatter for JsonFormatter {
    fn format_answer(&self, answer: &Answer, brief: bool) -> String {
        let json = match answer {
            Answer::Found { question, result } if brief => {
                let best = result.best();
                serde_json::json!({
                    "status": "found",
                    "question": question,
                    "heading": brief_heading(question),
                    "answer": best.map(|e| truncate_chars(e.text.trim(), BRIEF_CHARS)),
                    "source": best.map(ScoredEntry::source),
                })
            }
            Answer::Found { question, result } => serde_json::json!({
                "status": "found",
                "question": question,
                "answer": join_passages(&result.entries),
                "passages": result.entries,
            }),
            Answer::NoAnswer { question, reason } => serde_json::json!({
                "status": "no_answer",
                "question": question,
                "reason": reason,
                "message": reason.message(),
            }),
        };
        self.render(&json)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_index_report(&self, report: &IndexReport) -> String {
        self.render(report)
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", serde_json::json!({"message": message}))
    }

    fn format_error(&self, error: &str) -> String {
        format!("{}\n", serde_json::json!({"error": error}))
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_answer(&self, answer: &Answer, brief: bool) -> String {
        let result = match answer {
            Answer::NoAnswer { reason, .. } => return format!("> {}\n", reason.message()),
            Answer::Found { result, .. } => result,
        };

        let mut output = String::new();
        if brief {
            if let Some(best) = result.best() {
                writeln!(output, "**{}:**", brief_heading(answer.question())).unwrap();
                writeln!(output, "{}\n", truncate_chars(best.text.trim(), BRIEF_CHARS)).unwrap();
                writeln!(output, "📄 `{}`", best.source()).unwrap();
            }
            return output;
        }

        writeln!(output, "## Answer\n").unwrap();
        writeln!(output, "**Question:** {}\n", answer.question()).unwrap();
        for (i, entry) in result.entries.iter().enumerate() {
            if i > 0 {
                writeln!(output, "---\n").unwrap();
            }
            writeln!(output, "{}\n", entry.text.trim()).unwrap();
            writeln!(
                output,
                "📄 `{}` (distance {:.3})\n",
                entry.source(),
                entry.distance
            )
            .unwrap();
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();
        writeln!(output, "- **Data dir:** `{}`", status.data_dir).unwrap();
        writeln!(output, "- **Index dir:** `{}`", status.index_dir).unwrap();
        writeln!(
            output,
            "- **Embedding:** {} ({})",
            status.embedding_model, status.embedding_provider
        )
        .unwrap();
        writeln!(output).unwrap();

        match &status.index {
            Some(manifest) => {
                writeln!(output, "### Index ✅\n").unwrap();
                writeln!(output, "| Property | Value |").unwrap();
                writeln!(output, "|----------|-------|").unwrap();
                writeln!(output, "| Entries | {} |", manifest.count).unwrap();
                writeln!(output, "| Model | `{}` |", manifest.model_id).unwrap();
                writeln!(output, "| Dimension | {} |", manifest.dimension).unwrap();
                writeln!(output, "| Metric | {} |", manifest.metric).unwrap();
                writeln!(output, "| Built | {} |", manifest.built_at.to_rfc3339()).unwrap();
            }
            None => {
                writeln!(output, "### Index ❌\n").unwrap();
                if let Some(ref reason) = status.index_error {
                    writeln!(output, "{}", preview(reason, 200)).unwrap();
                }
            }
        }

        if let Some(ref m) = status.metrics {
            writeln!(output, "\n### Queries\n").unwrap();
            writeln!(output, "- **Total:** {}", m.total_queries).unwrap();
            writeln!(output, "- **Avg Latency:** {}ms", m.avg_latency_ms).unwrap();
            writeln!(output, "- **No Answer:** {:.1}%", m.no_answer_rate).unwrap();
            if m.error_rate > 0.0 {
                writeln!(output, "- **Error Rate:** {:.1}%", m.error_rate).unwrap();
            }
        }

        output
    }

    fn format_index_report(&self, report: &IndexReport) -> String {
        let stats = &report.stats;
        let mut output = String::new();
        writeln!(output, "## Indexing Complete\n").unwrap();
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        writeln!(output, "| Documents loaded | {} |", stats.documents).unwrap();
        writeln!(output, "| Empty documents | {} |", stats.empty_documents).unwrap();
        writeln!(output, "| Chunks indexed | {} |", stats.chunks).unwrap();
        writeln!(output, "| Blank chunks skipped | {} |", stats.skipped_chunks).unwrap();
        writeln!(output, "| Index entries | {} |", report.entries).unwrap();
        writeln!(output, "| Location | `{}` |", report.location).unwrap();
        writeln!(output, "| Duration | {}ms |", stats.duration_ms).unwrap();
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metadata, NoAnswerReason, QueryResult, SOURCE_KEY};

    fn entry(text: &str, source: &str, distance: f32) -> ScoredEntry {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), source.to_string());
        ScoredEntry {
            text: text.to_string(),
            metadata,
            distance,
        }
    }

    fn found(question: &str) -> Answer {
        Answer::Found {
            question: question.to_string(),
            result: QueryResult::new(vec![
                entry("Annual leave is 20 days.", "/data/leave.txt", 0.1),
                entry("Carry-over ends in March.", "/data/leave.txt", 0.3),
            ]),
        }
    }

    #[test]
    fn test_brief_heading() {
        assert_eq!(brief_heading("What is ANNUAL leave?"), "LEAVE POLICY");
        assert_eq!(brief_heading("sick days"), "SICK LEAVE");
        assert_eq!(brief_heading("health benefits"), "BENEFITS");
        assert_eq!(brief_heading("office hours"), "FOUND");
        // leave takes precedence over sick
        assert_eq!(brief_heading("sick leave"), "LEAVE POLICY");
    }

    #[test]
    fn test_text_answer_joins_passages() {
        let output = TextFormatter.format_answer(&found("annual leave"), false);
        assert!(output.contains("Annual leave is 20 days.\n\n---\n\nCarry-over ends in March."));
        assert!(output.contains("1. /data/leave.txt"));
    }

    #[test]
    fn test_text_brief_truncates() {
        let long = "x".repeat(300);
        let answer = Answer::Found {
            question: "benefits?".to_string(),
            result: QueryResult::new(vec![entry(&long, "/data/b.txt", 0.0)]),
        };
        let output = TextFormatter.format_answer(&answer, true);
        assert!(output.starts_with("BENEFITS:\n"));
        assert!(output.contains(&"x".repeat(BRIEF_CHARS)));
        assert!(!output.contains(&"x".repeat(BRIEF_CHARS + 1)));
    }

    #[test]
    fn test_no_answer_message() {
        let answer = Answer::NoAnswer {
            question: String::new(),
            reason: NoAnswerReason::MissingIndex,
        };
        let output = TextFormatter.format_answer(&answer, false);
        assert_eq!(output, format!("{}\n", NoAnswerReason::MissingIndex.message()));
    }

    #[test]
    fn test_json_answer() {
        let output = JsonFormatter::new(false).format_answer(&found("annual leave"), false);
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["status"], "found");
        assert_eq!(json["passages"].as_array().unwrap().len(), 2);
        assert_eq!(json["passages"][0]["metadata"]["source"], "/data/leave.txt");
    }

    #[test]
    fn test_json_index_report_flattens_stats() {
        let report = IndexReport {
            location: "index".to_string(),
            entries: 3,
            stats: BuildStats {
                documents: 2,
                chunks: 3,
                ..Default::default()
            },
        };
        let output = JsonFormatter::new(false).format_index_report(&report);
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["documents"], 2);
        assert_eq!(json["entries"], 3);
    }

    #[test]
    fn test_error_formats() {
        assert_eq!(TextFormatter.format_error("boom"), "Error: boom\n");
        let json: serde_json::Value =
            serde_json::from_str(&JsonFormatter::new(false).format_error("boom")).unwrap();
        assert_eq!(json["error"], "boom");
        assert!(MarkdownFormatter.format_error("boom").contains("boom"));
    }
}
