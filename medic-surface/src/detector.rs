//! Breaking change detection between two code snapshots.

use crate::diff::{diff, generate_migration_guide, overall_severity, ChangeRecord};
use crate::python::PythonSurfaceExtractor;
use crate::surface::{ApiSurface, SurfaceExtractor};
use medic_core::{AgentName, SemVer, Severity, SurfaceError};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakingChangeReport {
    pub agent: AgentName,
    pub from_version: SemVer,
    pub to_version: SemVer,
    pub changes: Vec<ChangeRecord>,
    pub overall_severity: Option<Severity>,
    /// Any critical or high change.
    pub migration_required: bool,
    /// Extraction failures. When non-empty, `changes` is empty and the
    /// comparison was skipped.
    #[serde(serialize_with = "serialize_warnings")]
    pub warnings: Vec<SurfaceError>,
}

fn serialize_warnings<S: Serializer>(warnings: &[SurfaceError], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(warnings.iter().map(SurfaceError::to_string))
}

impl BreakingChangeReport {
    /// Critical and high changes, the ones recorded on a version.
    pub fn breaking_changes(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.changes.iter().filter(|c| c.is_breaking())
    }

    pub fn migration_guide(&self) -> String {
        generate_migration_guide(&self.changes)
    }
}

#[derive(Clone)]
pub struct BreakingChangeDetector {
    extractor: Arc<dyn SurfaceExtractor>,
}

impl Default for BreakingChangeDetector {
    fn default() -> Self {
        Self::new(Arc::new(PythonSurfaceExtractor::new()))
    }
}

impl std::fmt::Debug for BreakingChangeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakingChangeDetector")
            .field("language", &self.extractor.language())
            .finish()
    }
}

impl BreakingChangeDetector {
    pub fn new(extractor: Arc<dyn SurfaceExtractor>) -> Self {
        Self { extractor }
    }

    pub fn extract_public_surface(&self, code: &str) -> Result<ApiSurface, SurfaceError> {
        self.extractor.extract(code, "new")
    }

    /// Compare `old_code` against `new_code`. Never fails: unparseable input
    /// yields an empty report carrying the parse errors as warnings.
    pub fn compare(
        &self,
        agent: &AgentName,
        from_version: SemVer,
        to_version: SemVer,
        old_code: &str,
        new_code: &str,
    ) -> BreakingChangeReport {
        let old = self.extractor.extract(old_code, "old");
        let new = self.extractor.extract(new_code, "new");

        let (changes, warnings) = match (old, new) {
            (Ok(old), Ok(new)) => (diff(&old, &new), Vec::new()),
            (old, new) => {
                let warnings: Vec<SurfaceError> =
                    [old.err(), new.err()].into_iter().flatten().collect();
                for warning in &warnings {
                    warn!(
                        agent = %agent,
                        language = self.extractor.language(),
                        error = %warning,
                        "breaking change analysis skipped"
                    );
                }
                (Vec::new(), warnings)
            }
        };

        let overall = overall_severity(&changes);
        let migration_required = changes.iter().any(ChangeRecord::is_breaking);
        debug!(
            agent = %agent,
            from = %from_version,
            to = %to_version,
            changes = changes.len(),
            migration_required,
            "surface compared"
        );

        BreakingChangeReport {
            agent: agent.clone(),
            from_version,
            to_version,
            changes,
            overall_severity: overall,
            migration_required,
            warnings,
        }
    }
}
