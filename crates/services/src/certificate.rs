use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storage::keys;
use storage::repository::ProgressStore;

use crate::error::CertificateError;

/// Everything the certificate template needs. Rendering (PDF/print) is
/// delegated to the platform, so this service stops at the data record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateData {
    pub full_name: String,
    pub score: f64,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub completed_at: DateTime<Utc>,
    pub certificate_id: String,
}

/// Builds certificate data from the stored final-exam result.
#[derive(Clone)]
pub struct CertificateService {
    store: ProgressStore,
}

impl CertificateService {
    #[must_use]
    pub fn new(store: ProgressStore) -> Self {
        Self { store }
    }

    /// Assembles a certificate for the given student name, minting a fresh
    /// certificate id.
    ///
    /// # Errors
    ///
    /// Returns `CertificateError::NoResult` if the final exam was never
    /// taken, `CertificateError::NotPassed` if the stored score is below
    /// the threshold, or `CertificateError::Storage` on backend failure.
    pub async fn issue(&self, full_name: &str) -> Result<CertificateData, CertificateError> {
        let result = self
            .store
            .load_exam_result(keys::EXAM_FINAL_RESULT)
            .await?
            .ok_or(CertificateError::NoResult)?;

        if !result.passed() {
            return Err(CertificateError::NotPassed {
                score: result.score,
            });
        }

        let name = if full_name.trim().is_empty() {
            result.full_name.clone()
        } else {
            full_name.trim().to_owned()
        };

        Ok(CertificateData {
            full_name: name,
            score: result.score,
            correct_answers: result.correct_answers,
            total_questions: result.total_questions,
            completed_at: result.completed_at,
            certificate_id: Uuid::new_v4().to_string(),
        })
    }
}
