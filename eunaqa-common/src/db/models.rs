//! Database models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Batch execution status for QA sweep runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
        }
    }
}

/// Review outcome recorded on a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixStatus {
    Pending,
    Applied,
    Rejected,
}

impl FixStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixStatus::Pending => "pending",
            FixStatus::Applied => "applied",
            FixStatus::Rejected => "rejected",
        }
    }
}

/// Risk classification assigned by the diagnostic process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Low => "low",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "high" => Ok(RiskLevel::High),
            "medium" => Ok(RiskLevel::Medium),
            "low" => Ok(RiskLevel::Low),
            other => Err(Error::InvalidInput(format!(
                "Invalid risk level: {} (expected high, medium or low)",
                other
            ))),
        }
    }
}

/// One generated exam question, possibly a corrected version of another
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionVariation {
    pub guid: String,
    pub base_question_id: i64,
    pub variation_number: i64,
    /// Incremented on correction
    pub version: i64,
    /// Back-reference to the version this one corrects
    pub parent_version_id: Option<String>,
    pub statement: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
    pub specialty: Option<String>,
    pub topic: Option<String>,
    pub confidence_score: Option<f64>,
    pub last_qa_date: Option<String>,
    /// Gates whether students can see the variation
    pub is_visible: bool,
    pub created_at: String,
}

impl QuestionVariation {
    /// New first-version variation with generated identity
    pub fn new(base_question_id: i64, variation_number: i64, statement: impl Into<String>) -> Self {
        Self {
            guid: Uuid::new_v4().to_string(),
            base_question_id,
            variation_number,
            version: 1,
            parent_version_id: None,
            statement: statement.into(),
            options: Vec::new(),
            correct_answer: String::new(),
            explanation: String::new(),
            specialty: None,
            topic: None,
            confidence_score: None,
            last_qa_date: None,
            is_visible: true,
            created_at: super::now_rfc3339(),
        }
    }
}

/// Structured AI diagnosis payload stored on a sweep result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Categorical defect severity (0=none .. 3=severe)
    pub severidad_global: Option<i64>,
    /// Defect labels
    #[serde(default)]
    pub etiquetas: Vec<String>,
    /// Risk classification (high/medium/low)
    pub riesgo: Option<String>,
    /// Recommended decision
    pub decision: Option<String>,
}

/// One AI diagnostic pass over a variation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaSweepResult {
    pub guid: String,
    pub run_id: String,
    pub variation_id: String,
    pub confidence_score: Option<f64>,
    pub diagnosis: Diagnosis,
    /// Proposed patch payload, if the diagnosis produced one
    pub corrections: Option<serde_json::Value>,
    pub status: String,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub latency_ms: i64,
    pub created_at: String,
}

impl QaSweepResult {
    pub fn new(run_id: impl Into<String>, variation_id: impl Into<String>) -> Self {
        Self {
            guid: Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            variation_id: variation_id.into(),
            confidence_score: None,
            diagnosis: Diagnosis::default(),
            corrections: None,
            status: "COMPLETED".to_string(),
            tokens_in: 0,
            tokens_out: 0,
            latency_ms: 0,
            created_at: super::now_rfc3339(),
        }
    }
}

/// A batch execution grouping many results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaSweepRun {
    pub guid: String,
    pub name: String,
    pub description: String,
    pub status: String,
    pub config: serde_json::Value,
    pub created_at: String,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
}

impl QaSweepRun {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            guid: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            status: RunStatus::Pending.as_str().to_string(),
            config: serde_json::json!({}),
            created_at: super::now_rfc3339(),
            started_at: None,
            ended_at: None,
        }
    }
}

/// One field-level proposed edit inside a review-queue patch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchEdit {
    /// Target field: `statement`, `correct_answer`, `explanation` or
    /// `option:<index>`
    pub field: String,
    pub original_value: serde_json::Value,
    pub proposed_value: serde_json::Value,
    pub reason: Option<String>,
    pub confidence: Option<f64>,
}

/// A pending human-review unit wrapping an AI-proposed patch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewQueueItem {
    pub guid: String,
    pub result_id: String,
    pub variation_id: String,
    pub risk_level: String,
    pub labels: Vec<String>,
    pub critique: String,
    /// Raw patch payload as stored; parse with [`ReviewQueueItem::parsed_patch`]
    pub patch: serde_json::Value,
    pub fix_status: String,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
}

impl ReviewQueueItem {
    pub fn new(
        result_id: impl Into<String>,
        variation_id: impl Into<String>,
        risk_level: RiskLevel,
    ) -> Self {
        Self {
            guid: Uuid::new_v4().to_string(),
            result_id: result_id.into(),
            variation_id: variation_id.into(),
            risk_level: risk_level.as_str().to_string(),
            labels: Vec::new(),
            critique: String::new(),
            patch: serde_json::json!([]),
            fix_status: FixStatus::Pending.as_str().to_string(),
            review_notes: None,
            reviewed_at: None,
            created_at: super::now_rfc3339(),
        }
    }

    /// Parse the stored patch payload into typed edits
    ///
    /// A payload that does not deserialize is a malformed patch; callers
    /// must fail the apply without committing anything.
    pub fn parsed_patch(&self) -> Result<Vec<PatchEdit>> {
        serde_json::from_value(self.patch.clone())
            .map_err(|e| Error::InvalidInput(format!("Malformed patch payload: {}", e)))
    }
}

/// Platform user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub guid: String,
    pub email: String,
    pub name: String,
    pub created_at: String,
}

impl User {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            guid: Uuid::new_v4().to_string(),
            email: email.into(),
            name: name.into(),
            created_at: super::now_rfc3339(),
        }
    }
}

/// Catalog package (control, exam or mock-exam depending on table)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub guid: String,
    pub name: String,
    pub description: String,
    pub unit_count: i64,
    pub price_clp: i64,
    pub is_active: bool,
    pub created_at: String,
}

/// Entitlement record tracking consumed-vs-total units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPurchase {
    pub guid: String,
    pub user_id: String,
    pub package_id: String,
    pub total_units: i64,
    pub used_units: i64,
    pub created_at: String,
}
