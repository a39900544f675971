use medic_core::{ChangeType, RollbackSafety, VersionRecord};

/// Classify a rollback across `reverted` records.
///
/// Any breaking change makes the range DANGEROUS. Otherwise a major bump or a
/// migration-required record makes it CAUTION. An empty range is SAFE.
pub fn assess_rollback_safety<'a, I>(reverted: I) -> RollbackSafety
where
    I: IntoIterator<Item = &'a VersionRecord>,
{
    reverted
        .into_iter()
        .map(|record| {
            if !record.breaking_changes.is_empty() {
                RollbackSafety::Dangerous
            } else if record.change_type == ChangeType::Major || record.migration_required {
                RollbackSafety::Caution
            } else {
                RollbackSafety::Safe
            }
        })
        .max()
        .unwrap_or(RollbackSafety::Safe)
}
