//! Tenant sync quota gate.
//!
//! The governor is a pure, side-effect-free check that must run before any
//! provider call: if the plan disables sync, or the current period's usage
//! has reached the quota, the attempt is denied with a reason the caller
//! can surface verbatim. "Disabled" and "exhausted" are distinct denials —
//! they mean different remediation for the user.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use juris_db::models::{ProcessSync, TenantPlan};

use crate::error::{SyncError, SyncResult};

/// Plan limits relevant to synchronization.
#[derive(Debug, Clone, Copy)]
pub struct PlanLimits {
    pub sync_enabled: bool,
    pub sync_quota: i64,
}

/// Collaborator contract for plan limits and usage counters.
///
/// The billing/plan subsystem is outside this crate; the engine only
/// consumes these two lookups.
#[async_trait]
pub trait PlanLimitsService: Send + Sync {
    /// Sync entitlements for a tenant.
    async fn fetch_plan_limits(&self, tenant_id: Uuid) -> SyncResult<PlanLimits>;

    /// Sync attempts already consumed by the tenant in the current period.
    async fn count_usage(&self, tenant_id: Uuid) -> SyncResult<i64>;
}

/// Postgres-backed [`PlanLimitsService`].
///
/// Usage is the count of non-webhook sync records started this calendar
/// month plus the legacy query counter imported from the pre-migration
/// system.
#[derive(Clone)]
pub struct PgPlanLimits {
    pool: PgPool,
}

impl PgPlanLimits {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn period_start(now: DateTime<Utc>) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now)
    }
}

#[async_trait]
impl PlanLimitsService for PgPlanLimits {
    async fn fetch_plan_limits(&self, tenant_id: Uuid) -> SyncResult<PlanLimits> {
        let plan = TenantPlan::find_for_tenant(&self.pool, tenant_id).await?;
        Ok(match plan {
            Some(p) => PlanLimits {
                sync_enabled: p.sync_enabled,
                sync_quota: i64::from(p.sync_quota),
            },
            // No plan row means the tenant was never entitled.
            None => PlanLimits {
                sync_enabled: false,
                sync_quota: 0,
            },
        })
    }

    async fn count_usage(&self, tenant_id: Uuid) -> SyncResult<i64> {
        let since = Self::period_start(Utc::now());
        let started = ProcessSync::count_started_since(&self.pool, tenant_id, since).await?;
        let legacy = TenantPlan::find_for_tenant(&self.pool, tenant_id)
            .await?
            .map_or(0, |p| i64::from(p.legacy_query_count));
        Ok(started + legacy)
    }
}

/// Plan-based gate deciding whether a new sync may start.
pub struct QuotaGovernor;

impl QuotaGovernor {
    /// Pure decision on limits and usage.
    pub fn evaluate(limits: &PlanLimits, used: i64) -> SyncResult<()> {
        if !limits.sync_enabled {
            return Err(SyncError::IntegrationDisabled);
        }
        if used >= limits.sync_quota {
            return Err(SyncError::QuotaExceeded {
                used,
                quota: limits.sync_quota,
            });
        }
        Ok(())
    }

    /// Fetch limits and usage, then evaluate.
    pub async fn check(service: &dyn PlanLimitsService, tenant_id: Uuid) -> SyncResult<()> {
        let limits = service.fetch_plan_limits(tenant_id).await?;
        let used = service.count_usage(tenant_id).await?;
        Self::evaluate(&limits, used)
    }
}
