use serde::{Deserialize, Serialize};

/// Closed set of pipeline step categories. Every step name maps to
/// exactly one category; names matching no rule fall back to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepCategory {
    Install,
    Build,
    Test,
    Lint,
    Checkout,
    Setup,
    Cache,
    Affected,
    Secrets,
    Other,
}

impl StepCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Build => "build",
            Self::Test => "test",
            Self::Lint => "lint",
            Self::Checkout => "checkout",
            Self::Setup => "setup",
            Self::Cache => "cache",
            Self::Affected => "affected",
            Self::Secrets => "secrets",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for StepCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered classification rules: the first category whose phrase list
/// matches the lowercased step name wins. Kept as data so new step names
/// can be classified without touching aggregation logic.
const RULES: &[(StepCategory, &[&str])] = &[
    (StepCategory::Install, &["install npm"]),
    (StepCategory::Build, &["build"]),
    (StepCategory::Test, &["test"]),
    (StepCategory::Lint, &["lint"]),
    (StepCategory::Checkout, &["checkout"]),
    (StepCategory::Setup, &["setup node"]),
    (StepCategory::Cache, &["cache turbo"]),
    (StepCategory::Affected, &["affected"]),
    (StepCategory::Secrets, &["secret"]),
];

/// Map a raw step name to its category. Case-insensitive substring
/// matching; total over all inputs.
pub fn categorize_step(name: &str) -> StepCategory {
    let lower = name.to_lowercase();
    for (category, phrases) in RULES {
        if phrases.iter().any(|phrase| lower.contains(phrase)) {
            return *category;
        }
    }
    StepCategory::Other
}
