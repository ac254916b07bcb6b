//! Scenario library
//!
//! A versioned, ordered catalog of evaluation prompts. Each scenario carries
//! natural-language checks the grader judges one by one. Scenario ids are the
//! join key across runs, so a published id must never change meaning.
//!
//! # Example
//!
//! ```
//! use coach_eval_core::scenarios::{Category, ScenarioLibrary};
//!
//! let library = ScenarioLibrary::builtin();
//! let race_facts: Vec<_> = library.by_category(Category::RaceFacts).collect();
//! assert!(!race_facts.is_empty());
//! assert_eq!(library.fingerprint().len(), 64);
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::error::{EvalError, Result};

mod catalog;

pub use catalog::LIBRARY_VERSION;

/// Closed set of scenario categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Race Facts", alias = "race_facts")]
    RaceFacts,
    #[serde(rename = "Training Programming", alias = "training_programming")]
    TrainingProgramming,
    #[serde(rename = "Pacing Strategy", alias = "pacing_strategy")]
    PacingStrategy,
    #[serde(rename = "Nutrition", alias = "nutrition")]
    Nutrition,
    #[serde(rename = "Recovery", alias = "recovery")]
    Recovery,
    #[serde(rename = "Safety & Injury", alias = "safety_injury")]
    SafetyInjury,
    #[serde(rename = "Supplements", alias = "supplements")]
    Supplements,
    #[serde(rename = "Coaching Style", alias = "coaching_style")]
    CoachingStyle,
    #[serde(rename = "Equipment & Technique", alias = "equipment_technique")]
    EquipmentTechnique,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::RaceFacts,
        Category::TrainingProgramming,
        Category::PacingStrategy,
        Category::Nutrition,
        Category::Recovery,
        Category::SafetyInjury,
        Category::Supplements,
        Category::CoachingStyle,
        Category::EquipmentTechnique,
    ];

    /// Stable display name, also the serialized form
    pub fn display_name(self) -> &'static str {
        match self {
            Category::RaceFacts => "Race Facts",
            Category::TrainingProgramming => "Training Programming",
            Category::PacingStrategy => "Pacing Strategy",
            Category::Nutrition => "Nutrition",
            Category::Recovery => "Recovery",
            Category::SafetyInjury => "Safety & Injury",
            Category::Supplements => "Supplements",
            Category::CoachingStyle => "Coaching Style",
            Category::EquipmentTechnique => "Equipment & Technique",
        }
    }

    /// Areas where a wrong answer misleads or endangers athletes
    pub fn is_critical(self) -> bool {
        matches!(
            self,
            Category::RaceFacts | Category::SafetyInjury | Category::Supplements
        )
    }

    /// Resolve a display name or snake_case alias
    pub fn from_name(name: &str) -> Option<Category> {
        let normalized = name.trim().to_lowercase().replace(['_', '-'], " ");
        Category::ALL.into_iter().find(|c| {
            let display = c.display_name().to_lowercase();
            display == normalized || display.replace(" & ", " ") == normalized
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Whether a scenario belongs to the original baseline set or was added to
/// target a known regression
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    #[default]
    Baseline,
    RegressionTarget,
}

impl Provenance {
    pub fn from_name(name: &str) -> Option<Provenance> {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "baseline" => Some(Provenance::Baseline),
            "regression_target" | "regression" => Some(Provenance::RegressionTarget),
            _ => None,
        }
    }
}

/// One evaluation prompt with its ordered checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub category: Category,
    pub prompt: String,
    #[serde(default)]
    pub checks: Vec<String>,
    #[serde(default)]
    pub provenance: Provenance,
}

impl Scenario {
    pub fn new(
        id: impl Into<String>,
        category: Category,
        prompt: impl Into<String>,
        checks: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            prompt: prompt.into(),
            checks: checks.into_iter().map(Into::into).collect(),
            provenance: Provenance::Baseline,
        }
    }

    pub fn regression_target(mut self) -> Self {
        self.provenance = Provenance::RegressionTarget;
        self
    }

    /// Scenarios without checks are collected but never graded
    pub fn is_gradable(&self) -> bool {
        !self.checks.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LibraryFile {
    Versioned {
        version: String,
        scenarios: Vec<Scenario>,
    },
    Bare(Vec<Scenario>),
}

/// Ordered, validated scenario catalog
#[derive(Debug, Clone)]
pub struct ScenarioLibrary {
    version: String,
    scenarios: Vec<Scenario>,
}

impl ScenarioLibrary {
    /// Build a library, rejecting empty or duplicate ids and empty prompts
    pub fn new(version: impl Into<String>, scenarios: Vec<Scenario>) -> Result<Self> {
        let mut seen = HashSet::new();
        for scenario in &scenarios {
            if scenario.id.trim().is_empty() {
                return Err(EvalError::Library("scenario with empty id".to_string()));
            }
            if scenario.prompt.trim().is_empty() {
                return Err(EvalError::Library(format!(
                    "scenario '{}' has an empty prompt",
                    scenario.id
                )));
            }
            if !seen.insert(scenario.id.as_str()) {
                return Err(EvalError::Library(format!(
                    "duplicate scenario id '{}'",
                    scenario.id
                )));
            }
        }
        Ok(Self {
            version: version.into(),
            scenarios,
        })
    }

    /// The compiled-in coaching catalog
    pub fn builtin() -> Self {
        Self {
            version: LIBRARY_VERSION.to_string(),
            scenarios: catalog::scenarios(),
        }
    }

    /// Load from a JSON or YAML file (chosen by extension).
    ///
    /// Accepts `{version, scenarios: [...]}` or a bare list; a bare list is
    /// versioned by its file name.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let parsed: LibraryFile = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&raw)?,
            _ => serde_json::from_str(&raw)?,
        };

        let library = match parsed {
            LibraryFile::Versioned { version, scenarios } => Self::new(version, scenarios)?,
            LibraryFile::Bare(scenarios) => {
                let name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("custom");
                Self::new(format!("file:{}", name), scenarios)?
            }
        };
        tracing::info!(
            path = %path.display(),
            version = %library.version,
            scenarios = library.len(),
            "loaded scenario library"
        );
        Ok(library)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// SHA-256 over ids, prompts and checks in definition order
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for scenario in &self.scenarios {
            hasher.update(scenario.id.as_bytes());
            hasher.update([0u8]);
            hasher.update(scenario.prompt.as_bytes());
            hasher.update([0u8]);
            for check in &scenario.checks {
                hasher.update(check.as_bytes());
                hasher.update([0x1f]);
            }
            hasher.update([0x1e]);
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter()
    }

    pub fn as_slice(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter().filter(move |s| s.category == category)
    }

    pub fn by_provenance(&self, provenance: Provenance) -> impl Iterator<Item = &Scenario> {
        self.scenarios
            .iter()
            .filter(move |s| s.provenance == provenance)
    }

    pub fn get(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    /// Keep only scenarios matching the predicate, preserving order
    pub fn filtered(&self, keep: impl Fn(&Scenario) -> bool) -> Self {
        Self {
            version: self.version.clone(),
            scenarios: self.scenarios.iter().filter(|s| keep(s)).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_is_valid() {
        let library = ScenarioLibrary::builtin();
        assert!(ScenarioLibrary::new(library.version(), library.as_slice().to_vec()).is_ok());
        assert!(library.len() >= 20);
        for category in Category::ALL {
            assert!(
                library.by_category(category).next().is_some(),
                "no scenarios for {}",
                category
            );
        }
        assert!(library.by_provenance(Provenance::RegressionTarget).next().is_some());
    }

    #[test]
    fn test_selection_preserves_order() {
        let library = ScenarioLibrary::builtin();
        let all_ids: Vec<&str> = library.iter().map(|s| s.id.as_str()).collect();
        let facts: Vec<&str> = library
            .by_category(Category::RaceFacts)
            .map(|s| s.id.as_str())
            .collect();
        let positions: Vec<usize> = facts
            .iter()
            .map(|id| all_ids.iter().position(|a| a == id).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_lookup_by_id() {
        let library = ScenarioLibrary::builtin();
        let scenario = library.get("race-facts-women-open-weights").unwrap();
        assert_eq!(scenario.category, Category::RaceFacts);
        assert_eq!(scenario.checks.len(), 4);
        assert!(library.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let scenarios = vec![
            Scenario::new("a", Category::Nutrition, "p1", ["c"]),
            Scenario::new("a", Category::Recovery, "p2", ["c"]),
        ];
        let err = ScenarioLibrary::new("v", scenarios).unwrap_err();
        assert!(matches!(err, EvalError::Library(ref m) if m.contains("duplicate")));
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let scenarios = vec![Scenario::new("a", Category::Nutrition, "  ", ["c"])];
        assert!(ScenarioLibrary::new("v", scenarios).is_err());
    }

    #[test]
    fn test_zero_check_scenario_allowed() {
        let scenarios = vec![Scenario::new("probe", Category::CoachingStyle, "hi", Vec::<String>::new())];
        let library = ScenarioLibrary::new("v", scenarios).unwrap();
        assert!(!library.get("probe").unwrap().is_gradable());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = ScenarioLibrary::new(
            "v",
            vec![Scenario::new("a", Category::Nutrition, "p", ["c1"])],
        )
        .unwrap();
        let b = ScenarioLibrary::new(
            "v",
            vec![Scenario::new("a", Category::Nutrition, "p", ["c2"])],
        )
        .unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
    }

    #[test]
    fn test_category_names() {
        assert_eq!(Category::SafetyInjury.to_string(), "Safety & Injury");
        assert_eq!(Category::from_name("safety_injury"), Some(Category::SafetyInjury));
        assert_eq!(Category::from_name("Race Facts"), Some(Category::RaceFacts));
        assert_eq!(Category::from_name("bogus"), None);
        assert!(Category::Supplements.is_critical());
        assert!(!Category::Nutrition.is_critical());
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            r#"version: "2025.2"
scenarios:
  - id: nutrition-race-morning
    category: nutrition
    prompt: What should I eat on race morning?
    checks:
      - recommends a familiar, carbohydrate-focused breakfast
  - id: probe
    category: Coaching Style
    prompt: Hello coach
    provenance: regression_target
"#
        )
        .unwrap();

        let library = ScenarioLibrary::from_file(file.path()).unwrap();
        assert_eq!(library.version(), "2025.2");
        assert_eq!(library.len(), 2);
        assert_eq!(library.as_slice()[1].provenance, Provenance::RegressionTarget);
        assert!(library.as_slice()[1].checks.is_empty());
    }

    #[test]
    fn test_load_bare_json_list() {
        let mut file = tempfile::Builder::new()
            .prefix("subset")
            .suffix(".json")
            .tempfile()
            .unwrap();
        write!(
            file,
            r#"[{{"id":"x","category":"Recovery","prompt":"p","checks":["c"]}}]"#
        )
        .unwrap();
        let library = ScenarioLibrary::from_file(file.path()).unwrap();
        assert!(library.version().starts_with("file:subset"));
    }
}
