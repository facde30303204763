// ==========================================
// Call-Off Management - quota API
// ==========================================
// Responsibility: read-only quota views - balances for the admission
// UI and the quota dashboard listing. Quotas themselves are maintained
// by the upstream trade-capture system.
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::error::ApiResult;
use crate::domain::balance::QuotaBalance;
use crate::domain::quota::Quota;
use crate::engine::quota_ledger::QuotaLedger;
use crate::repository::call_off_repo::CallOffRepository;
use crate::repository::quota_repo::QuotaRepository;

// ==========================================
// QuotaWithBalance - dashboard row
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaWithBalance {
    pub quota: Quota,
    pub balance: QuotaBalance,
}

// ==========================================
// QuotaApi
// ==========================================
pub struct QuotaApi {
    quota_repo: Arc<QuotaRepository>,
    ledger: QuotaLedger,
}

impl QuotaApi {
    pub fn new(quota_repo: Arc<QuotaRepository>, call_off_repo: Arc<CallOffRepository>) -> Self {
        let ledger = QuotaLedger::new(Arc::clone(&quota_repo), call_off_repo);
        Self { quota_repo, ledger }
    }

    /// Live balance of one quota, recomputed from its call-off set
    pub fn get_balance(&self, quota_id: &str) -> ApiResult<QuotaBalance> {
        Ok(self.ledger.get_balance(quota_id)?)
    }

    /// All quotas with their computed balances
    pub fn list_quotas(&self) -> ApiResult<Vec<QuotaWithBalance>> {
        let quotas = self.quota_repo.list_all()?;
        let mut rows = Vec::with_capacity(quotas.len());
        for quota in quotas {
            let balance = self.ledger.balance_for(&quota)?;
            rows.push(QuotaWithBalance { quota, balance });
        }
        Ok(rows)
    }
}
