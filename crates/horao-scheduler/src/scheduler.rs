//! Reservation admission: tenant limits, infrastructure capacity, and
//! (optionally) dynamic-start planning.

use crate::error::SchedulerError;
use horao_domain::{Claim, LogicalInfrastructure, ResourceTotals, Tenant};

const DEFAULT_PLANNING_WINDOW_SECS: i64 = 31 * 24 * 3600;
const DEFAULT_PLANNING_INTERVAL_SECS: i64 = 3600;

/// Knobs the scheduler reads at construction; all map to environment
/// variables surfaced by `Config` in the binary crate.
#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    /// Whether a start-less reservation is scanned for a fit (`true`) or
    /// rejected outright (`false`).
    pub dynamic_start: bool,
    pub planning_window_secs: i64,
    pub planning_interval_secs: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dynamic_start: false,
            planning_window_secs: DEFAULT_PLANNING_WINDOW_SECS,
            planning_interval_secs: DEFAULT_PLANNING_INTERVAL_SECS,
        }
    }
}

/// Admits or rejects tenant reservations against a replica's current
/// state. Holds no CRDT-mutating side effects until `schedule` commits by
/// appending to `infrastructure.claims`.
pub struct Scheduler<'a> {
    infrastructure: &'a mut LogicalInfrastructure,
    config: SchedulerConfig,
}

impl<'a> Scheduler<'a> {
    pub fn new(infrastructure: &'a mut LogicalInfrastructure, config: SchedulerConfig) -> Self {
        Self {
            infrastructure,
            config,
        }
    }

    /// Admit `reservation` on behalf of `tenant`, evaluated as of `now`
    /// (unix seconds). On success, the reservation is appended to the
    /// replica's claim list and its effective start is returned.
    pub fn schedule(
        &mut self,
        reservation: Claim,
        tenant: &Tenant,
        now: i64,
    ) -> Result<i64, SchedulerError> {
        let span = tracing::info_span!("scheduler_decision", tenant = %tenant.name);
        let _entered = span.enter();
        let outcome = self.schedule_inner(reservation, tenant, now);
        match &outcome {
            Ok(start) => tracing::info!(accepted = true, start, "reservation decision"),
            Err(reason) => tracing::info!(accepted = false, %reason, "reservation decision"),
        }
        outcome
    }

    fn schedule_inner(
        &mut self,
        reservation: Claim,
        tenant: &Tenant,
        now: i64,
    ) -> Result<i64, SchedulerError> {
        let (resources, hsn_only, start, end) = match &reservation {
            Claim::Reservation {
                resources,
                hsn_only,
                start,
                end,
                ..
            } => (resources.clone(), *hsn_only, *start, *end),
            Claim::Maintenance { .. } => return Err(SchedulerError::ClaimCannotBeRealised),
        };

        let mut claim_totals = ResourceTotals::default();
        claim_totals.add(&resources);

        if let Some(constraint) = self.infrastructure.constraint_for(&tenant.name) {
            if claim_totals.exceeds(&constraint.limits) {
                return Err(SchedulerError::TenantLimitExceeded(
                    "Claim exceeds tenant limits".to_string(),
                ));
            }
        }

        let infra_totals = self.infrastructure.totals(hsn_only);

        let resolved_start = match start {
            Some(start) => {
                self.capacity_check(&infra_totals, &claim_totals, start, end)?;
                start
            }
            None => {
                if !self.config.dynamic_start {
                    return Err(SchedulerError::NoStartDate);
                }
                self.scan_for_start(&infra_totals, &claim_totals, end, now)?
            }
        };

        self.infrastructure.add_claim(reservation);
        Ok(resolved_start)
    }

    fn scan_for_start(
        &self,
        infra_totals: &ResourceTotals,
        claim_totals: &ResourceTotals,
        end: Option<i64>,
        now: i64,
    ) -> Result<i64, SchedulerError> {
        let deadline = now + self.config.planning_window_secs;
        let mut candidate = now;
        while candidate < deadline {
            if self
                .capacity_check(infra_totals, claim_totals, candidate, end)
                .is_ok()
            {
                return Ok(candidate);
            }
            candidate += self.config.planning_interval_secs;
        }
        Err(SchedulerError::ClaimCannotBeRealised)
    }

    /// Whether `claim_totals` fits within `infra_totals` once every claim
    /// overlapping `[window_start, end]` is subtracted out.
    fn capacity_check(
        &self,
        infra_totals: &ResourceTotals,
        claim_totals: &ResourceTotals,
        window_start: i64,
        end: Option<i64>,
    ) -> Result<(), SchedulerError> {
        let window_end = end.unwrap_or(i64::MAX);
        let mut used = ResourceTotals::default();
        for claim in self.infrastructure.claims_overlapping(window_start, window_end) {
            used.add(claim.resources());
        }
        let available = infra_totals.saturating_sub(&used);

        if claim_totals.cpu > available.cpu {
            return Err(SchedulerError::InfrastructureLimitExceeded(
                "Claim exceeds compute CPU infrastructure limits".to_string(),
            ));
        }
        if claim_totals.ram_gb > available.ram_gb {
            return Err(SchedulerError::InfrastructureLimitExceeded(
                "Claim exceeds compute RAM infrastructure limits".to_string(),
            ));
        }
        if claim_totals.accelerators > available.accelerators {
            return Err(SchedulerError::InfrastructureLimitExceeded(
                "Claim exceeds compute accelerator infrastructure limits".to_string(),
            ));
        }
        if claim_totals.block_storage_gb > available.block_storage_gb {
            return Err(SchedulerError::InfrastructureLimitExceeded(
                "Claim exceeds block storage infrastructure limits".to_string(),
            ));
        }
        Ok(())
    }
}
