//! Command output in text or JSON form
//!
//! Handlers build a payload type and hand it to [`OutputWriter`]; the
//! `--output` flag decides whether it is rendered as a table or serialised.

use std::io::Write;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes command payloads in the selected [`OutputFormat`].
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Writes `payload` to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let mut stdout = std::io::stdout().lock();
        self.render_to(payload, &mut stdout)?;
        stdout.flush()?;
        Ok(())
    }

    /// Writes `payload` to `w`. JSON output is one pretty-printed document
    /// followed by a newline.
    pub fn render_to<T: Render + Serialize>(
        &self,
        payload: &T,
        w: &mut dyn Write,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => payload.render_text(w)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, payload)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Human-readable rendering of a command payload.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

/// `-` for a missing column value.
pub fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

/// Cuts `s` to at most `max` characters, ending in `...` when shortened.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_owned();
    }
    let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Counts {
        report_id: String,
        findings: u32,
    }

    impl Render for Counts {
        fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
            writeln!(w, "{}: {} finding(s)", self.report_id, self.findings)
        }
    }

    fn counts() -> Counts {
        Counts {
            report_id: "r-1".to_owned(),
            findings: 3,
        }
    }

    #[test]
    fn text_uses_render_impl() {
        let mut buf = Vec::new();
        OutputWriter::new(OutputFormat::Text)
            .render_to(&counts(), &mut buf)
            .unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "r-1: 3 finding(s)\n");
    }

    #[test]
    fn json_is_one_document_with_trailing_newline() {
        let mut buf = Vec::new();
        OutputWriter::new(OutputFormat::Json)
            .render_to(&counts(), &mut buf)
            .unwrap();
        assert!(buf.ends_with(b"}\n"));
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["report_id"], "r-1");
        assert_eq!(value["findings"], 3);
    }

    #[test]
    fn missing_values_render_as_dash() {
        assert_eq!(or_dash(None), "-");
        assert_eq!(or_dash(Some("443")), "443");
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Weekly internal scan", 10), "Weekly ...");
        assert_eq!(truncate("Überprüfung der Hosts", 8), "Überp...");
    }
}
