use medic_core::{AgentName, SemVer};

/// Render the migration script stub attached to a breaking transition.
pub fn migration_script_stub(
    agent: &AgentName,
    from: SemVer,
    to: SemVer,
    breaking_changes: &[String],
) -> String {
    let mut script = format!(
        "# Migration for {agent}: {from} -> {to}\n#\n# {} breaking change(s).\n",
        breaking_changes.len()
    );
    for (step, change) in breaking_changes.iter().enumerate() {
        script.push_str(&format!(
            "\n## Step {}: {change}\n\
             - Find every dependent of {agent} that relies on this behaviour.\n\
             - Update those call sites for {to}.\n\
             - Re-run the dependents' regression stage before deploying.\n",
            step + 1
        ));
    }
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_lists_every_change_in_order() {
        let script = migration_script_stub(
            &AgentName::from("parser"),
            SemVer::new(1, 2, 0),
            SemVer::new(2, 0, 0),
            &[
                "removed parse_legacy()".to_string(),
                "renamed config key".to_string(),
            ],
        );
        assert!(script.starts_with("# Migration for parser: 1.2.0 -> 2.0.0"));
        let first = script.find("Step 1: removed parse_legacy()").unwrap();
        let second = script.find("Step 2: renamed config key").unwrap();
        assert!(first < second);
        assert!(!script.contains("TODO"));
    }
}
