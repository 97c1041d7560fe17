use serde::Serialize;
use std::fmt;

use crate::error::Result;

/// Component lifecycle stages, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    /// Local setup, no operator interaction; run in parallel
    Initialize,
    /// Component specific questions; run one component at a time
    Prompts,
    /// Remote create/update calls; run in parallel
    ApiCalls,
    /// Best-effort release of local resources; run in parallel
    Cleanup,
}

impl Stage {
    /// All stages in pipeline order
    pub const ALL: [Stage; 4] = [Stage::Initialize, Stage::Prompts, Stage::ApiCalls, Stage::Cleanup];

    /// Whether components run this stage concurrently
    pub fn is_parallel(self) -> bool {
        !matches!(self, Stage::Prompts)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Initialize => "initialize",
            Stage::Prompts => "prompts",
            Stage::ApiCalls => "apiCalls",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Collapses the per-component results of a parallel stage
///
/// Every task has already finished; the first failure in discovery order
/// becomes the stage error.
pub fn join_stage<T>(stage: Stage, results: Vec<(String, Result<T>)>) -> Result<Vec<(String, T)>> {
    let mut values = Vec::with_capacity(results.len());
    for (name, result) in results {
        match result {
            Ok(value) => values.push((name, value)),
            Err(e) => return Err(e.in_stage(stage, &name)),
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SetupError;
    use test_case::test_case;

    #[test_case(Stage::Initialize, "initialize", true)]
    #[test_case(Stage::Prompts, "prompts", false)]
    #[test_case(Stage::ApiCalls, "apiCalls", true)]
    #[test_case(Stage::Cleanup, "cleanup", true)]
    fn test_display_and_mode(stage: Stage, name: &str, parallel: bool) {
        assert_eq!(stage.to_string(), name);
        assert_eq!(stage.is_parallel(), parallel);
    }

    #[test]
    fn test_join_stage_reports_first_failure_in_order() {
        let results = vec![
            ("system".to_string(), Ok(1)),
            ("postgres".to_string(), Err(SetupError::new("down"))),
            ("redis".to_string(), Err(SetupError::new("also down"))),
        ];
        match join_stage(Stage::ApiCalls, results) {
            Err(SetupError::Stage { stage, component, .. }) => {
                assert_eq!(stage, Stage::ApiCalls);
                assert_eq!(component, "postgres");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_join_stage_success() -> Result<()> {
        let values = join_stage(Stage::Cleanup, vec![("a".to_string(), Ok(()))])?;
        assert_eq!(values.len(), 1);
        Ok(())
    }
}
