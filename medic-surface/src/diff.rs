//! Surface comparison and migration guidance.

use crate::surface::{ApiSurface, FunctionSignature};
use medic_core::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of incompatibility between two surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    FunctionRemoved,
    SignatureChanged,
    ReturnTypeChanged,
    ConstantRemoved,
    ConstantChanged,
    ClassRemoved,
    MethodRemoved,
}

impl ChangeKind {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ChangeKind::FunctionRemoved => "function_removed",
            ChangeKind::SignatureChanged => "signature_changed",
            ChangeKind::ReturnTypeChanged => "return_type_changed",
            ChangeKind::ConstantRemoved => "constant_removed",
            ChangeKind::ConstantChanged => "constant_changed",
            ChangeKind::ClassRemoved => "class_removed",
            ChangeKind::MethodRemoved => "method_removed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub severity: Severity,
    /// `function`, `Class`, `Class.method` or `CONSTANT`
    pub symbol: String,
    pub description: String,
    pub migration_hint: String,
}

impl ChangeRecord {
    fn new(
        kind: ChangeKind,
        severity: Severity,
        symbol: impl Into<String>,
        description: impl Into<String>,
        migration_hint: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            symbol: symbol.into(),
            description: description.into(),
            migration_hint: migration_hint.into(),
        }
    }

    /// Critical and high changes break existing callers.
    pub fn is_breaking(&self) -> bool {
        self.severity >= Severity::High
    }
}

fn list(names: &[&str]) -> String {
    names.join(", ")
}

fn compare_signatures(symbol: &str, old: &FunctionSignature, new: &FunctionSignature, out: &mut Vec<ChangeRecord>) {
    let old_names = old.param_names();
    let new_names = new.param_names();
    let old_set: BTreeSet<&str> = old_names.iter().copied().collect();
    let new_set: BTreeSet<&str> = new_names.iter().copied().collect();
    let removed: Vec<&str> = old_names.iter().copied().filter(|n| !new_set.contains(n)).collect();
    let added: Vec<&str> = new_names.iter().copied().filter(|n| !old_set.contains(n)).collect();

    if new_names.len() < old_names.len() {
        let detail = if removed.is_empty() {
            format!("{} parameter(s)", old_names.len() - new_names.len())
        } else {
            list(&removed)
        };
        out.push(ChangeRecord::new(
            ChangeKind::SignatureChanged,
            Severity::Critical,
            symbol,
            format!("`{symbol}` lost parameters: {detail}"),
            format!("Drop the removed arguments ({detail}) from every call to `{symbol}`."),
        ));
    } else if new.required_count() > old.required_count() {
        let required: Vec<&str> = new
            .params
            .iter()
            .filter(|p| p.is_required() && !old_set.contains(p.name.as_str()))
            .map(|p| p.name.as_str())
            .collect();
        let detail = if required.is_empty() {
            "existing parameters lost their defaults".to_string()
        } else {
            format!("new required parameters: {}", list(&required))
        };
        out.push(ChangeRecord::new(
            ChangeKind::SignatureChanged,
            Severity::Critical,
            symbol,
            format!("`{symbol}` requires more arguments ({detail})"),
            format!("Pass every required argument at each call site of `{symbol}`."),
        ));
    } else if !removed.is_empty() {
        let renames: Vec<String> = removed
            .iter()
            .zip(added.iter().chain(std::iter::repeat(&"?")))
            .map(|(from, to)| format!("{from} -> {to}"))
            .collect();
        out.push(ChangeRecord::new(
            ChangeKind::SignatureChanged,
            Severity::High,
            symbol,
            format!("`{symbol}` renamed parameters: {}", renames.join(", ")),
            format!(
                "Update keyword arguments in calls to `{symbol}`: {}.",
                renames.join(", ")
            ),
        ));
    } else if new_names[..old_names.len()] != old_names[..] {
        out.push(ChangeRecord::new(
            ChangeKind::SignatureChanged,
            Severity::High,
            symbol,
            format!(
                "`{symbol}` reordered parameters: ({}) -> ({})",
                list(&old_names),
                list(&new_names)
            ),
            format!("Use keyword arguments when calling `{symbol}` or reorder positional ones."),
        ));
    } else if new_names.len() > old_names.len() {
        out.push(ChangeRecord::new(
            ChangeKind::SignatureChanged,
            Severity::Low,
            symbol,
            format!("`{symbol}` gained optional parameters: {}", list(&added)),
            format!("No action required; the new parameters of `{symbol}` have defaults."),
        ));
    }

    if let (Some(before), Some(after)) = (&old.return_annotation, &new.return_annotation) {
        if before != after {
            out.push(ChangeRecord::new(
                ChangeKind::ReturnTypeChanged,
                Severity::High,
                symbol,
                format!("`{symbol}` now returns `{after}` instead of `{before}`"),
                format!("Review callers that use the result of `{symbol}`."),
            ));
        }
    }
}

/// Compare two surfaces. Additions of new symbols are compatible and not
/// reported.
pub fn diff(old: &ApiSurface, new: &ApiSurface) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();

    for (name, before) in &old.functions {
        match new.functions.get(name) {
            Some(after) => compare_signatures(name, before, after, &mut changes),
            None => changes.push(ChangeRecord::new(
                ChangeKind::FunctionRemoved,
                Severity::Critical,
                name.as_str(),
                format!("Function `{name}` was removed"),
                format!("Remove or replace calls to `{name}`."),
            )),
        }
    }

    for (name, before) in &old.classes {
        let Some(after) = new.classes.get(name) else {
            changes.push(ChangeRecord::new(
                ChangeKind::ClassRemoved,
                Severity::Critical,
                name.as_str(),
                format!("Class `{name}` was removed"),
                format!("Replace uses of `{name}` and its subclasses."),
            ));
            continue;
        };
        for (method, sig) in &before.methods {
            let symbol = format!("{name}.{method}");
            match after.methods.get(method) {
                Some(new_sig) => compare_signatures(&symbol, sig, new_sig, &mut changes),
                None => changes.push(ChangeRecord::new(
                    ChangeKind::MethodRemoved,
                    Severity::High,
                    symbol.clone(),
                    format!("Method `{symbol}` was removed"),
                    format!("Remove or replace calls to `{symbol}`."),
                )),
            }
        }
    }

    for (name, value) in &old.constants {
        match new.constants.get(name) {
            None => changes.push(ChangeRecord::new(
                ChangeKind::ConstantRemoved,
                Severity::High,
                name.as_str(),
                format!("Constant `{name}` was removed"),
                format!("Inline the former value `{value}` or use its replacement."),
            )),
            Some(next) if next != value => changes.push(ChangeRecord::new(
                ChangeKind::ConstantChanged,
                Severity::Medium,
                name.as_str(),
                format!("Constant `{name}` changed from `{value}` to `{next}`"),
                format!("Check code that relies on the value of `{name}`."),
            )),
            Some(_) => {}
        }
    }

    changes
}

/// Highest severity among `changes`.
pub fn overall_severity(changes: &[ChangeRecord]) -> Option<Severity> {
    changes.iter().map(|c| c.severity).max()
}

/// Human-readable guide grouped by severity, most severe first.
pub fn generate_migration_guide(changes: &[ChangeRecord]) -> String {
    if changes.is_empty() {
        return "No breaking changes detected.\n".to_string();
    }
    let mut guide = format!("Migration guide ({} change(s))\n", changes.len());
    for severity in [Severity::Critical, Severity::High, Severity::Medium, Severity::Low] {
        let group: Vec<&ChangeRecord> = changes.iter().filter(|c| c.severity == severity).collect();
        if group.is_empty() {
            continue;
        }
        guide.push('\n');
        guide.push_str(&severity.as_db_str().to_uppercase());
        guide.push('\n');
        for change in group {
            guide.push_str(&format!(
                "  - [{}] {}\n    {}\n",
                change.kind, change.description, change.migration_hint
            ));
        }
    }
    guide
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::surface::Parameter;
    use proptest::prelude::*;

    fn arb_signature() -> impl Strategy<Value = FunctionSignature> {
        prop::collection::vec(("[a-z]{1,6}", any::<bool>()), 0..6).prop_map(|params| {
            let mut seen = BTreeSet::new();
            FunctionSignature {
                name: "f".to_string(),
                params: params
                    .into_iter()
                    .filter(|(name, _)| seen.insert(name.clone()))
                    .map(|(name, has_default)| Parameter {
                        name,
                        has_default,
                        variadic: false,
                    })
                    .collect(),
                return_annotation: None,
                decorators: Vec::new(),
            }
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_unchanged_signature_reports_nothing(sig in arb_signature()) {
            let mut changes = Vec::new();
            compare_signatures("f", &sig, &sig, &mut changes);
            prop_assert!(changes.is_empty());
        }

        #[test]
        fn prop_fewer_parameters_always_critical(sig in arb_signature()) {
            prop_assume!(!sig.params.is_empty());
            let mut shorter = sig.clone();
            shorter.params.pop();
            let mut changes = Vec::new();
            compare_signatures("f", &sig, &shorter, &mut changes);
            prop_assert_eq!(changes.len(), 1);
            prop_assert_eq!(changes[0].severity, Severity::Critical);
        }
    }
}
