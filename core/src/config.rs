use crate::{
    late_fee::{DEFAULT_DAILY_LATE_FEE, DEFAULT_LATE_FEE_CAP},
    model::AgreementStatus,
    types::Money,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Late fees ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LateFeePolicy {
    /// Fallback per-day rate when an agreement carries none.
    pub daily_rate: Money,
    /// Maximum fee for a single rental period.
    pub cap_amount: Money,
    /// Last day of the month a payment is still on time.
    #[serde(default = "default_grace_day")]
    pub grace_day: u32,
}

fn default_grace_day() -> u32 {
    1
}

impl Default for LateFeePolicy {
    fn default() -> Self {
        Self {
            daily_rate: DEFAULT_DAILY_LATE_FEE,
            cap_amount: DEFAULT_LATE_FEE_CAP,
            grace_day:  default_grace_day(),
        }
    }
}

// ── Fine validation ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FineValidationConfig {
    /// Fixed pause between fines during batch validation.
    pub inter_item_delay_ms: u64,
}

impl FineValidationConfig {
    pub fn inter_item_delay(&self) -> Duration {
        Duration::from_millis(self.inter_item_delay_ms)
    }
}

// ── Root ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconConfig {
    pub late_fee:          LateFeePolicy,
    pub fine_validation:   FineValidationConfig,
    /// Statuses that compete for the single authoritative agreement per vehicle.
    pub conflict_statuses: Vec<AgreementStatus>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReconFile {
    late_fee: LateFeePolicy,
    #[serde(default)]
    fine_validation: FineValidationConfig,
    #[serde(default)]
    conflict_statuses: Option<Vec<AgreementStatus>>,
}

fn default_conflict_statuses() -> Vec<AgreementStatus> {
    vec![AgreementStatus::Active, AgreementStatus::PendingPayment]
}

impl ReconConfig {
    /// Load from the data/ directory.
    /// In tests, use ReconConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/reconciliation/recon_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let file: ReconFile = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;

        if file.late_fee.cap_amount < 0.0 || file.late_fee.daily_rate < 0.0 {
            anyhow::bail!("{path}: late fee rate and cap must be non-negative");
        }

        Ok(Self {
            late_fee:          file.late_fee,
            fine_validation:   file.fine_validation,
            conflict_statuses: file
                .conflict_statuses
                .filter(|s| !s.is_empty())
                .unwrap_or_else(default_conflict_statuses),
        })
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        Self {
            late_fee:          LateFeePolicy::default(),
            fine_validation:   FineValidationConfig { inter_item_delay_ms: 0 },
            conflict_statuses: default_conflict_statuses(),
        }
    }
}
