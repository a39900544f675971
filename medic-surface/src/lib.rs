//! MEDIC Surface - Breaking Change Detector
//!
//! Extracts the public API surface of an agent's code and classifies the
//! differences between two snapshots by severity. Extraction sits behind the
//! [`SurfaceExtractor`] trait; [`PythonSurfaceExtractor`] is the built-in
//! implementation.

mod detector;
mod diff;
mod python;
mod surface;

pub use detector::{BreakingChangeDetector, BreakingChangeReport};
pub use diff::{diff, generate_migration_guide, overall_severity, ChangeKind, ChangeRecord};
pub use python::PythonSurfaceExtractor;
pub use surface::{ApiSurface, ClassSurface, FunctionSignature, Parameter, SurfaceExtractor};
