//! 인메모리 저장소
//!
//! 드라이런과 테스트에서 사용하는 [`MemoryStore`]입니다.
//! SQL 저장소와 같은 키/참조 무결성 규칙을 적용합니다.

use std::collections::BTreeMap;

use openvas_sync_core::types::{Finding, FindingRecord, Report, Vulnerability};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::repository::{FindingRepository, ReportRepository, VulnerabilityRepository};

#[derive(Default)]
struct MemoryState {
    reports: BTreeMap<String, Report>,
    /// vuln_id -> vulnerability
    vulnerabilities: BTreeMap<String, Vulnerability>,
    /// 삽입 순서 유지
    findings: Vec<Finding>,
}

impl MemoryState {
    fn vulnerability_by_name(&self, name: &str) -> Option<&Vulnerability> {
        self.vulnerabilities.values().find(|v| v.name == name)
    }

    fn check_references(&self, record: &FindingRecord) -> Result<(), StoreError> {
        if !self.reports.contains_key(&record.report_id) {
            return Err(StoreError::ForeignKey {
                entity: "finding",
                key: record.report_id.clone(),
                reason: "report does not exist".to_owned(),
            });
        }
        if !self.vulnerabilities.contains_key(&record.vuln_id) {
            return Err(StoreError::ForeignKey {
                entity: "finding",
                key: record.vuln_id.clone(),
                reason: "vulnerability does not exist".to_owned(),
            });
        }
        Ok(())
    }
}

/// 인메모리 저장소
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 (리포트, 취약점, finding) 수를 반환합니다.
    pub async fn counts(&self) -> (usize, usize, usize) {
        let state = self.state.lock().await;
        (
            state.reports.len(),
            state.vulnerabilities.len(),
            state.findings.len(),
        )
    }
}

impl ReportRepository for MemoryStore {
    async fn create_report(&self, report: &Report) -> Result<Report, StoreError> {
        let mut state = self.state.lock().await;
        if state.reports.contains_key(&report.report_id) {
            return Err(StoreError::DuplicateKey {
                entity: "report",
                key: report.report_id.clone(),
            });
        }
        state
            .reports
            .insert(report.report_id.clone(), report.clone());
        Ok(report.clone())
    }

    async fn get_report(&self, report_id: &str) -> Result<Option<Report>, StoreError> {
        Ok(self.state.lock().await.reports.get(report_id).cloned())
    }

    async fn list_reports(&self) -> Result<Vec<Report>, StoreError> {
        Ok(self.state.lock().await.reports.values().cloned().collect())
    }

    async fn update_report(&self, report: &Report) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        match state.reports.get_mut(&report.report_id) {
            Some(existing) => {
                *existing = report.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "report",
                key: report.report_id.clone(),
            }),
        }
    }

    async fn delete_report(&self, report_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.reports.remove(report_id).is_none() {
            return Err(StoreError::NotFound {
                entity: "report",
                key: report_id.to_owned(),
            });
        }
        state.findings.retain(|f| f.record.report_id != report_id);
        Ok(())
    }
}

impl VulnerabilityRepository for MemoryStore {
    async fn find_or_create_vulnerability(
        &self,
        vuln: &Vulnerability,
    ) -> Result<Vulnerability, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.vulnerability_by_name(&vuln.name) {
            return Ok(existing.clone());
        }
        if let Some(existing) = state.vulnerabilities.get(&vuln.vuln_id) {
            return Ok(existing.clone());
        }
        state
            .vulnerabilities
            .insert(vuln.vuln_id.clone(), vuln.clone());
        Ok(vuln.clone())
    }

    async fn get_vulnerability(&self, vuln_id: &str) -> Result<Option<Vulnerability>, StoreError> {
        Ok(self.state.lock().await.vulnerabilities.get(vuln_id).cloned())
    }

    async fn find_vulnerability_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Vulnerability>, StoreError> {
        Ok(self.state.lock().await.vulnerability_by_name(name).cloned())
    }

    async fn list_vulnerabilities(&self) -> Result<Vec<Vulnerability>, StoreError> {
        let mut all: Vec<Vulnerability> = self
            .state
            .lock()
            .await
            .vulnerabilities
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn update_vulnerability(&self, vuln: &Vulnerability) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.vulnerabilities.contains_key(&vuln.vuln_id) {
            return Err(StoreError::NotFound {
                entity: "vulnerability",
                key: vuln.vuln_id.clone(),
            });
        }
        if state
            .vulnerability_by_name(&vuln.name)
            .is_some_and(|other| other.vuln_id != vuln.vuln_id)
        {
            return Err(StoreError::DuplicateKey {
                entity: "vulnerability",
                key: vuln.name.clone(),
            });
        }
        state
            .vulnerabilities
            .insert(vuln.vuln_id.clone(), vuln.clone());
        Ok(())
    }

    async fn delete_vulnerability(&self, vuln_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.vulnerabilities.contains_key(vuln_id) {
            return Err(StoreError::NotFound {
                entity: "vulnerability",
                key: vuln_id.to_owned(),
            });
        }
        let references = state
            .findings
            .iter()
            .filter(|f| f.record.vuln_id == vuln_id)
            .count();
        if references > 0 {
            return Err(StoreError::ForeignKey {
                entity: "vulnerability",
                key: vuln_id.to_owned(),
                reason: format!("referenced by {references} finding(s)"),
            });
        }
        state.vulnerabilities.remove(vuln_id);
        Ok(())
    }
}

impl FindingRepository for MemoryStore {
    async fn create_finding(&self, record: &FindingRecord) -> Result<Finding, StoreError> {
        let mut state = self.state.lock().await;
        state.check_references(record)?;
        let finding = Finding {
            finding_id: Uuid::new_v4().to_string(),
            record: record.clone(),
        };
        state.findings.push(finding.clone());
        Ok(finding)
    }

    async fn get_finding(&self, finding_id: &str) -> Result<Option<Finding>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .findings
            .iter()
            .find(|f| f.finding_id == finding_id)
            .cloned())
    }

    async fn list_findings(&self) -> Result<Vec<Finding>, StoreError> {
        Ok(self.state.lock().await.findings.clone())
    }

    async fn list_findings_for_report(&self, report_id: &str) -> Result<Vec<Finding>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .findings
            .iter()
            .filter(|f| f.record.report_id == report_id)
            .cloned()
            .collect())
    }

    async fn update_finding(&self, finding: &Finding) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.check_references(&finding.record)?;
        match state
            .findings
            .iter_mut()
            .find(|f| f.finding_id == finding.finding_id)
        {
            Some(existing) => {
                *existing = finding.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "finding",
                key: finding.finding_id.clone(),
            }),
        }
    }

    async fn delete_finding(&self, finding_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let before = state.findings.len();
        state.findings.retain(|f| f.finding_id != finding_id);
        if state.findings.len() == before {
            return Err(StoreError::NotFound {
                entity: "finding",
                key: finding_id.to_owned(),
            });
        }
        Ok(())
    }
}
