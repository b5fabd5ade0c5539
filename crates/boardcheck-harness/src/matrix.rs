//! Matrix expansion: targets × examples, minus per-target exclusions.

use crate::config::TargetSpec;
use crate::exclusion::ExclusionSet;
use boardcheck_core::case::TestCase;
use boardcheck_core::example::ExampleBundle;
use boardcheck_core::ids::TargetId;
use boardcheck_core::ports::{ExampleSource, TargetRegistry};
use boardcheck_core::target::TargetProfile;
use boardcheck_core::{Error, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// A resolved target together with its exclusion rules.
#[derive(Debug, Clone)]
pub struct MatrixTarget {
    pub profile: Arc<TargetProfile>,
    pub exclusions: ExclusionSet,
}

/// A (target, example) pair left out of the matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCase {
    pub target: TargetId,
    pub example_key: String,
    /// Description of the rule that matched.
    pub rule: String,
}

/// Result of matrix expansion.
#[derive(Debug, Clone, Default)]
pub struct MatrixExpansion {
    pub cases: Vec<TestCase>,
    pub skipped: Vec<SkippedCase>,
}

impl MatrixExpansion {
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// Builds the ordered list of test cases.
pub struct MatrixBuilder {
    registry: Arc<dyn TargetRegistry>,
    examples: Arc<dyn ExampleSource>,
}

impl MatrixBuilder {
    pub fn new(registry: Arc<dyn TargetRegistry>, examples: Arc<dyn ExampleSource>) -> Self {
        Self { registry, examples }
    }

    /// Resolve targets, enumerate examples, and expand the matrix.
    ///
    /// Any target the registry cannot resolve aborts with a setup error.
    pub async fn build(
        &self,
        specs: &[TargetSpec],
        filter: Option<&str>,
    ) -> Result<MatrixExpansion> {
        let targets = self.resolve_targets(specs).await?;

        let examples = self
            .examples
            .list_all(filter)
            .await
            .map_err(|e| match e {
                Error::ExampleSource(_) => e,
                other => Error::ExampleSource(other.to_string()),
            })?;
        info!(examples = examples.len(), targets = targets.len(), "Expanding matrix");

        Ok(Self::expand(&targets, examples))
    }

    /// Resolve every configured target through the registry, in order.
    pub async fn resolve_targets(&self, specs: &[TargetSpec]) -> Result<Vec<MatrixTarget>> {
        let mut targets = Vec::with_capacity(specs.len());
        for spec in specs {
            let query = spec.query();
            let profile = match self.registry.resolve(&query).await {
                Ok(Some(profile)) => profile,
                Ok(None) => return Err(Error::TargetNotFound(format!("{} ({})", spec.id, query))),
                Err(e) if e.is_setup_failure() => return Err(e),
                Err(e) => {
                    return Err(Error::Setup(format!(
                        "resolving target {} failed: {}",
                        spec.id, e
                    )));
                }
            };
            debug!(target_id = %spec.id, descriptor = %profile.descriptor, "Resolved target");
            targets.push(MatrixTarget {
                profile: Arc::new(profile),
                exclusions: spec.exclude.clone(),
            });
        }
        Ok(targets)
    }

    /// Expand resolved targets against an enumerated example set.
    ///
    /// Cases are ordered by example key, with every target considered for one
    /// example before moving to the next.
    pub fn expand(targets: &[MatrixTarget], examples: BTreeMap<String, PathBuf>) -> MatrixExpansion {
        let mut expansion = MatrixExpansion::default();

        for (key, location) in examples {
            let bundle = Arc::new(ExampleBundle::new(key, location));

            for target in targets {
                if let Some(rule) = target.exclusions.first_match(&bundle.key) {
                    debug!(
                        target_id = %target.profile.id,
                        example = %bundle.key,
                        rule = %rule,
                        "Excluded"
                    );
                    expansion.skipped.push(SkippedCase {
                        target: target.profile.id.clone(),
                        example_key: bundle.key.clone(),
                        rule: rule.to_string(),
                    });
                    continue;
                }
                expansion
                    .cases
                    .push(TestCase::new(target.profile.clone(), bundle.clone()));
            }
        }

        expansion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusion::ExclusionRule;
    use std::collections::BTreeMap;

    fn target(id: &str, rules: Vec<ExclusionRule>) -> MatrixTarget {
        MatrixTarget {
            profile: Arc::new(TargetProfile {
                id: TargetId::new(id),
                index_source: "package_index.json".into(),
                vendor: "arduino".into(),
                package_name: "Arduino AVR Boards".into(),
                board_id: id.into(),
                options: BTreeMap::new(),
                descriptor: format!("arduino:avr:{}", id),
            }),
            exclusions: ExclusionSet::new(rules),
        }
    }

    fn examples(keys: &[&str]) -> BTreeMap<String, PathBuf> {
        keys.iter()
            .map(|k| (k.to_string(), PathBuf::from(format!("/examples/{}", k))))
            .collect()
    }

    #[test]
    fn test_matrix_expansion() {
        let targets = vec![target("leonardo", vec![]), target("uno", vec![])];
        let expansion = MatrixBuilder::expand(&targets, examples(&["b", "a", "c"]));

        assert_eq!(expansion.len(), 6); // 3 examples × 2 targets
        let names: Vec<_> = expansion.cases.iter().map(|c| c.display_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["leonardo: a", "uno: a", "leonardo: b", "uno: b", "leonardo: c", "uno: c"]
        );
    }

    #[test]
    fn test_matrix_with_exclude() {
        let targets = vec![
            target("leonardo", vec![]),
            target("uno", vec![ExclusionRule::Prefix("usb-".into())]),
        ];
        let expansion =
            MatrixBuilder::expand(&targets, examples(&["basics-blink", "usb-keyboard"]));

        // 2x2 = 4, minus 1 excluded = 3
        assert_eq!(expansion.len(), 3);
        assert_eq!(expansion.skipped.len(), 1);
        assert_eq!(expansion.skipped[0].target.as_str(), "uno");
        assert_eq!(expansion.skipped[0].example_key, "usb-keyboard");
        assert!(
            expansion
                .cases
                .iter()
                .any(|c| c.display_name == "leonardo: usb-keyboard")
        );
    }

    #[test]
    fn test_cases_share_bundle_across_targets() {
        let targets = vec![target("leonardo", vec![]), target("uno", vec![])];
        let expansion = MatrixBuilder::expand(&targets, examples(&["a"]));
        assert!(Arc::ptr_eq(&expansion.cases[0].example, &expansion.cases[1].example));
    }

    #[test]
    fn test_no_examples_yields_empty_matrix() {
        let targets = vec![target("uno", vec![])];
        let expansion = MatrixBuilder::expand(&targets, BTreeMap::new());
        assert!(expansion.is_empty());
    }
}
