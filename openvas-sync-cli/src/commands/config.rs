//! `openvas-sync config` command handler

use std::io::Write;
use std::path::Path;

use colored::Colorize;
use serde::Serialize;
use tracing::info;

use openvas_sync_core::config::SyncConfig;

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const SECTIONS: [&str; 4] = ["general", "gmp", "database", "ingest"];

/// Execute the `config show` subcommand against an already loaded configuration.
pub fn execute_show(
    config: &SyncConfig,
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let report = build_config_report(config, config_path, section)?;
    writer.render(&report)
}

/// Execute the `config validate` subcommand.
///
/// Unlike the other commands the file must exist. Missing credentials are
/// reported as warnings because they may be supplied through the environment
/// at run time.
///
/// # Errors
///
/// Returns `CliError::Config` if the file cannot be loaded or a value is invalid.
pub async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "config validate");

    let report = validate(config_path).await;
    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config(format!(
            "{} failed validation",
            config_path.display()
        )));
    }
    Ok(())
}

async fn validate(config_path: &Path) -> ConfigValidationReport {
    let source = config_path.display().to_string();
    match SyncConfig::load(config_path).await {
        Ok(config) => {
            let warnings = [config.require_gmp(), config.require_database()]
                .into_iter()
                .filter_map(Result::err)
                .map(|e| e.to_string())
                .collect();
            ConfigValidationReport {
                source,
                valid: true,
                errors: Vec::new(),
                warnings,
            }
        }
        Err(e) => ConfigValidationReport {
            source,
            valid: false,
            errors: vec![e.to_string()],
            warnings: Vec::new(),
        },
    }
}

fn build_config_report(
    config: &SyncConfig,
    config_path: &Path,
    section: Option<String>,
) -> Result<ConfigReport, CliError> {
    let redacted = config.redacted();
    let config_toml = match section.as_deref() {
        None => toml::to_string_pretty(&redacted),
        Some("general") => toml::to_string_pretty(&redacted.general),
        Some("gmp") => toml::to_string_pretty(&redacted.gmp),
        Some("database") => toml::to_string_pretty(&redacted.database),
        Some("ingest") => toml::to_string_pretty(&redacted.ingest),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section '{other}', expected one of {}",
                SECTIONS.join(", ")
            )));
        }
    }
    .map_err(|e| CliError::Command(format!("cannot render configuration: {e}")))?;

    Ok(ConfigReport {
        source: config_path.display().to_string(),
        section,
        config_toml,
    })
}

/// Effective configuration as TOML.
#[derive(Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Text output only; JSON consumers get `source` and `section`.
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let heading = match &self.section {
            Some(section) => format!("# {} [{section}]", self.source),
            None => format!("# {}", self.source),
        };
        writeln!(w, "{}", heading.dimmed())?;
        w.write_all(self.config_toml.as_bytes())
    }
}

/// Outcome of `config validate`.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    /// Load or validation errors; empty when `valid`
    pub errors: Vec<String>,
    /// Values that are still missing for `fetch`
    pub warnings: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let verdict = if self.valid {
            "ok".green().bold()
        } else {
            "invalid".red().bold()
        };
        writeln!(w, "{}: {verdict}", self.source)?;
        for err in &self.errors {
            writeln!(w, "  {} {err}", "error:".red())?;
        }
        for warning in &self.warnings {
            writeln!(w, "  {} {warning}", "warning:".yellow())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_masks_passwords() {
        let mut config = SyncConfig::default();
        config.gmp.password = "gmp-secret".to_owned();
        config.database.password = "db-secret".to_owned();

        let report = build_config_report(&config, Path::new("openvas-sync.toml"), None).unwrap();
        assert!(!report.config_toml.contains("gmp-secret"));
        assert!(!report.config_toml.contains("db-secret"));
        assert!(report.config_toml.contains("[database]"));
    }

    #[test]
    fn show_single_section() {
        let config = SyncConfig::default();
        let report = build_config_report(
            &config,
            Path::new("openvas-sync.toml"),
            Some("ingest".to_owned()),
        )
        .unwrap();
        assert!(report.config_toml.contains("on_row_error"));
        assert!(!report.config_toml.contains("socket_path"));
    }

    #[test]
    fn show_unknown_section_fails() {
        let config = SyncConfig::default();
        let result = build_config_report(
            &config,
            Path::new("openvas-sync.toml"),
            Some("ebpf".to_owned()),
        );
        assert!(matches!(result, Err(CliError::Command(_))));
    }

    #[test]
    fn validation_text_lists_errors_and_warnings() {
        colored::control::set_override(false);
        let report = ConfigValidationReport {
            source: "openvas-sync.toml".to_owned(),
            valid: false,
            errors: vec!["invalid value for general.log_format".to_owned()],
            warnings: vec!["missing required value: gmp.password".to_owned()],
        };
        let mut buf = Vec::new();
        report.render_text(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("openvas-sync.toml: invalid\n"));
        assert!(text.contains("  error: invalid value for general.log_format"));
        assert!(text.contains("  warning: missing required value: gmp.password"));
    }

    #[tokio::test]
    async fn validate_missing_file_is_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let report = validate(&tmp.path().join("missing.toml")).await;
        assert!(!report.valid);
        assert!(report.errors[0].contains("not found"));
    }

    #[tokio::test]
    async fn validate_reports_missing_credentials_as_warnings() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("openvas-sync.toml");
        std::fs::write(&path, "[database]\nengine = \"sqlite\"\nurl = \"/tmp/o.db\"\n").unwrap();

        let report = validate(&path).await;
        assert!(report.valid, "{:?}", report.errors);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("gmp."));
    }
}
