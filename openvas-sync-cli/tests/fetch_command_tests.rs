//! `fetch` and `reports` commands against a fake gvmd and a SQLite file.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

use openvas_sync_cli::cli::{FetchArgs, OutputFormat, ReportsAction, ReportsArgs, RowErrorArg};
use openvas_sync_cli::commands;
use openvas_sync_cli::error::CliError;
use openvas_sync_cli::output::OutputWriter;
use openvas_sync_core::config::SyncConfig;
use openvas_sync_gmp::envelope::is_complete_document;
use openvas_sync_storage::{
    FindingRepository, ReportRepository, SqlStore, StoreConfig, VulnerabilityRepository,
};

const AUTH_OK: &str = r#"<authenticate_response status="200" status_text="OK"><role>Admin</role></authenticate_response>"#;

const CSV_HEADER: &str = "IP,Hostname,Port,Port Protocol,CVSS,Severity,QoD,Solution Type,\
NVT Name,Summary,Specific Result,NVT OID,CVEs,Task ID,Task Name,Timestamp,Result ID,Impact,\
Solution,Affected Software/OS,Vulnerability Insight,Vulnerability Detection Method";

struct Fixture {
    dir: tempfile::TempDir,
    gvmd: JoinHandle<Vec<String>>,
}

impl Fixture {
    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    async fn config(&self) -> SyncConfig {
        let toml = format!(
            r#"
[general]
data_dir = "{data}"

[gmp]
socket_path = "{socket}"
username = "admin"
password = "admin"
request_timeout_secs = 5

[database]
engine = "sqlite"
url = "{db}"
max_connections = 1
"#,
            data = self.path("data").display(),
            socket = self.path("gvmd.sock").display(),
            db = self.path("openvas.db").display(),
        );
        let file = self.path("openvas-sync.toml");
        tokio::fs::write(&file, toml).await.unwrap();
        SyncConfig::load(&file).await.unwrap()
    }

    /// Requests received during the finished session.
    async fn requests(&mut self) -> Vec<String> {
        (&mut self.gvmd).await.unwrap()
    }

    /// Starts a fresh gvmd on the same socket.
    async fn restart(&mut self, reports: Reports) {
        let socket = self.path("gvmd.sock");
        tokio::fs::remove_file(&socket).await.unwrap();
        self.gvmd = serve(&socket, reports);
    }

    async fn store(&self) -> SqlStore {
        SqlStore::connect(&StoreConfig::sqlite(self.path("openvas.db").display().to_string()))
            .await
            .unwrap()
    }
}

async fn read_request(stream: &mut UnixStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if is_complete_document(&buf) {
            return String::from_utf8(buf).ok();
        }
    }
}

type Reports = Vec<(&'static str, String)>;

fn spawn_gvmd(reports: Reports) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let gvmd = serve(&dir.path().join("gvmd.sock"), reports);
    Fixture { dir, gvmd }
}

/// Serves one session, answering each request by command name.
fn serve(socket: &Path, reports: Reports) -> JoinHandle<Vec<String>> {
    let listener = UnixListener::bind(socket).unwrap();
    tokio::spawn(async move {
        let mut seen = Vec::new();
        let (mut stream, _) = listener.accept().await.unwrap();
        while let Some(request) = read_request(&mut stream).await {
            let reply = if request.starts_with("<authenticate>") {
                AUTH_OK.to_owned()
            } else if request.starts_with("<get_reports") {
                let ids: String = reports
                    .iter()
                    .map(|(id, _)| format!(r#"<report id="{id}"/>"#))
                    .collect();
                format!(r#"<get_reports_response status="200" status_text="OK">{ids}</get_reports_response>"#)
            } else {
                reports
                    .iter()
                    .find(|(id, _)| request.contains(&format!(r#"report_id="{id}""#)))
                    .map(|(_, body)| body.clone())
                    .unwrap_or_else(|| {
                        r#"<get_report_response status="404" status_text="Failed to find report"/>"#
                            .to_owned()
                    })
            };
            seen.push(request);
            stream.write_all(reply.as_bytes()).await.unwrap();
        }
        seen
    })
}

fn report_response(report_id: &str, rows: &[String]) -> String {
    let mut csv = format!("{CSV_HEADER}\n");
    for row in rows {
        csv.push_str(row);
        csv.push('\n');
    }
    format!(
        "<get_report_response status=\"200\" status_text=\"OK\">\
<report id=\"{report_id}\" format_id=\"c1645568-627a-11e3-a660-406186ea4fc5\" extension=\"csv\">\
<owner><name>admin</name></owner>\
<creation_time>2024-05-01T10:00:00Z</creation_time>\
<modification_time>2024-05-01T11:30:00Z</modification_time>\
<task id=\"t-1\"><name>Weekly internal scan</name></task>\
<scan_run_status>Done</scan_run_status>\
<scan_start>2024-05-01T10:00:05Z</scan_start>\
<scan_end>2024-05-01T11:29:00Z</scan_end>\
<result_count><full>{count}</full><filtered>{count}</filtered></result_count>\
<severity><full>7.5</full><filtered>7.5</filtered></severity>\
<report_format id=\"c1645568-627a-11e3-a660-406186ea4fc5\"><name>CSV Results</name></report_format>\
{payload}</report></get_report_response>",
        count = rows.len(),
        payload = STANDARD.encode(csv),
    )
}

fn row(ip: &str, name: &str, test_id: &str) -> String {
    format!(
        "{ip},host,22,tcp,7.5,High,95%,VendorFix,{name},Summary,Result,{test_id},CVE-2021-1,,,,,,Fix it,Linux,Insight,Remote"
    )
}

fn fetch_args(on_row_error: Option<RowErrorArg>) -> FetchArgs {
    FetchArgs {
        dry_run: false,
        on_duplicate: None,
        on_row_error,
        data_dir: None,
    }
}

fn writer() -> OutputWriter {
    OutputWriter::new(OutputFormat::Json)
}

fn artifact(fixture: &Fixture, report_id: &str) -> PathBuf {
    fixture.path("data").join(format!("{report_id}.csv"))
}

#[tokio::test]
async fn fetch_persists_reports_and_artifacts() {
    // Given: gvmd with two reports sharing one vulnerability
    let mut fixture = spawn_gvmd(vec![
        (
            "r-1",
            report_response(
                "r-1",
                &[
                    row("10.0.0.5", "OpenSSH Obsolete Version", "1.3.6.1.4.1.25623.1.0.1"),
                    row("10.0.0.6", "SSL/TLS Weak Cipher", "1.3.6.1.4.1.25623.1.0.2"),
                ],
            ),
        ),
        (
            "r-2",
            report_response(
                "r-2",
                &[row("10.0.0.7", "OpenSSH Obsolete Version", "1.3.6.1.4.1.25623.1.0.1")],
            ),
        ),
    ]);
    let config = fixture.config().await;

    // When: one fetch pass runs
    commands::fetch::execute(fetch_args(None), config, &writer())
        .await
        .unwrap();

    // Then: reports, deduplicated vulnerabilities, findings and CSV files exist
    let requests = fixture.requests().await;
    assert!(requests[0].starts_with("<authenticate>"));
    assert!(requests[1].starts_with("<get_reports"));

    let store = fixture.store().await;
    assert_eq!(store.list_reports().await.unwrap().len(), 2);
    assert_eq!(store.list_vulnerabilities().await.unwrap().len(), 2);
    assert_eq!(store.list_findings_for_report("r-1").await.unwrap().len(), 2);
    assert_eq!(store.list_findings_for_report("r-2").await.unwrap().len(), 1);
    store.close().await;

    assert!(artifact(&fixture, "r-1").is_file());
    assert!(artifact(&fixture, "r-2").is_file());
}

#[tokio::test]
async fn rerun_skips_stored_reports() {
    // Given: a report already ingested by a previous pass
    let body = report_response("r-1", &[row("10.0.0.5", "OpenSSH Obsolete Version", "oid-1")]);
    let mut fixture = spawn_gvmd(vec![("r-1", body.clone())]);
    let config = fixture.config().await;
    commands::fetch::execute(fetch_args(None), config.clone(), &writer())
        .await
        .unwrap();
    fixture.requests().await;

    // When: gvmd still lists it and a second pass runs on the same database
    fixture.restart(vec![("r-1", body)]).await;
    commands::fetch::execute(fetch_args(None), config, &writer())
        .await
        .unwrap();

    // Then: the report is not downloaded again and nothing is duplicated
    let requests = fixture.requests().await;
    assert_eq!(requests.len(), 2);
    assert!(!requests.iter().any(|r| r.starts_with("<get_report ")));

    let store = fixture.store().await;
    assert_eq!(store.list_reports().await.unwrap().len(), 1);
    assert_eq!(store.list_findings().await.unwrap().len(), 1);
    store.close().await;
}

#[tokio::test]
async fn dry_run_leaves_stored_artifacts_untouched() {
    // Given: a real pass has stored r-1 and its CSV artifact
    let stored = report_response("r-1", &[row("10.0.0.5", "OpenSSH Obsolete Version", "oid-1")]);
    let mut fixture = spawn_gvmd(vec![("r-1", stored)]);
    let config = fixture.config().await;
    commands::fetch::execute(fetch_args(None), config.clone(), &writer())
        .await
        .unwrap();
    fixture.requests().await;
    let before = std::fs::read(artifact(&fixture, "r-1")).unwrap();

    // When: gvmd now serves different content and a dry run fetches it
    let changed = report_response(
        "r-1",
        &[
            row("10.0.0.8", "SSL/TLS Weak Cipher", "oid-2"),
            row("10.0.0.9", "SSL/TLS Weak Cipher", "oid-2"),
        ],
    );
    fixture.restart(vec![("r-1", changed)]).await;
    let mut args = fetch_args(None);
    args.dry_run = true;
    commands::fetch::execute(args, config, &writer())
        .await
        .unwrap();

    // Then: the dry run downloaded the report but the artifact on disk is unchanged
    let requests = fixture.requests().await;
    assert!(requests.iter().any(|r| r.starts_with("<get_report ")));
    assert_eq!(std::fs::read(artifact(&fixture, "r-1")).unwrap(), before);

    let store = fixture.store().await;
    assert_eq!(store.list_findings().await.unwrap().len(), 1);
    store.close().await;
}

#[tokio::test]
async fn dry_run_writes_artifacts_to_explicit_data_dir() {
    let mut fixture = spawn_gvmd(vec![(
        "r-1",
        report_response("r-1", &[row("10.0.0.5", "OpenSSH Obsolete Version", "oid-1")]),
    )]);
    let config = fixture.config().await;
    let scratch = fixture.path("scratch");

    let mut args = fetch_args(None);
    args.dry_run = true;
    args.data_dir = Some(scratch.clone());
    commands::fetch::execute(args, config, &writer())
        .await
        .unwrap();
    fixture.requests().await;

    assert!(scratch.join("r-1.csv").is_file());
    assert!(!artifact(&fixture, "r-1").exists());
}

#[tokio::test]
async fn bad_rows_exit_with_incomplete_status() {
    // Given: a report whose second row is truncated
    let fixture = spawn_gvmd(vec![(
        "r-1",
        report_response(
            "r-1",
            &[
                row("10.0.0.5", "OpenSSH Obsolete Version", "oid-1"),
                "10.0.0.6,host,22,tcp,7.5".to_owned(),
                row("10.0.0.7", "SSL/TLS Weak Cipher", "oid-2"),
            ],
        ),
    )]);
    let config = fixture.config().await;

    // When: the default row policy applies
    let err = commands::fetch::execute(fetch_args(None), config, &writer())
        .await
        .unwrap_err();

    // Then: good rows are kept and the exit code flags the partial run
    assert!(matches!(err, CliError::IngestIncomplete(_)));
    assert_eq!(err.exit_code(), 5);
    let store = fixture.store().await;
    assert_eq!(store.list_findings_for_report("r-1").await.unwrap().len(), 2);
    store.close().await;
}

#[tokio::test]
async fn abort_report_policy_leaves_no_partial_report() {
    // Given: a report with one malformed row
    let fixture = spawn_gvmd(vec![(
        "r-1",
        report_response(
            "r-1",
            &[
                row("10.0.0.5", "OpenSSH Obsolete Version", "oid-1"),
                row("10.0.0.6", "Bad CVSS", "oid-2").replacen(",7.5,", ",high,", 1),
            ],
        ),
    )]);
    let config = fixture.config().await;

    // When: the run aborts reports on row failures
    let err = commands::fetch::execute(
        fetch_args(Some(RowErrorArg::AbortReport)),
        config,
        &writer(),
    )
    .await
    .unwrap_err();

    // Then: neither the report nor its findings remain
    assert_eq!(err.exit_code(), 5);
    let store = fixture.store().await;
    assert!(store.get_report("r-1").await.unwrap().is_none());
    assert!(store.list_findings().await.unwrap().is_empty());
    store.close().await;
}

#[tokio::test]
async fn reports_command_reads_back_ingested_data() {
    // Given: one ingested report
    let fixture = spawn_gvmd(vec![(
        "r-1",
        report_response("r-1", &[row("10.0.0.5", "OpenSSH Obsolete Version", "oid-1")]),
    )]);
    let config = fixture.config().await;
    commands::fetch::execute(fetch_args(None), config.clone(), &writer())
        .await
        .unwrap();

    // When/Then: list and show succeed, unknown ids are command errors
    commands::reports::execute(
        ReportsArgs {
            action: ReportsAction::List,
        },
        &config,
        &writer(),
    )
    .await
    .unwrap();
    commands::reports::execute(
        ReportsArgs {
            action: ReportsAction::Show {
                report_id: "r-1".to_owned(),
            },
        },
        &config,
        &writer(),
    )
    .await
    .unwrap();
    let err = commands::reports::execute(
        ReportsArgs {
            action: ReportsAction::Show {
                report_id: "r-404".to_owned(),
            },
        },
        &config,
        &writer(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn unreachable_scanner_maps_to_scanner_exit_code() {
    // Given: a configuration whose socket has no listener
    let dir = tempfile::tempdir().unwrap();
    let mut config = SyncConfig::default();
    config.gmp.socket_path = dir.path().join("missing.sock").display().to_string();
    config.gmp.username = "admin".to_owned();
    config.gmp.password = "admin".to_owned();
    config.general.data_dir = dir.path().join("data").display().to_string();

    // When: a dry run tries to connect
    let mut args = fetch_args(None);
    args.dry_run = true;
    let err = commands::fetch::execute(args, config, &writer())
        .await
        .unwrap_err();

    // Then
    assert!(matches!(err, CliError::Scanner(_)));
    assert_eq!(err.exit_code(), 3);
}
