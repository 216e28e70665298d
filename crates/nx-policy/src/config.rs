// config.rs - Policy configuration: raw settings, compiled config, file loading.
//
// Two layers, the same split the rest of the workspace uses for manifests:
//
// - `PolicySettings` / `NexusFile` are the serde shapes read from disk
//   (TOML or YAML). Every field has a default, and the defaults reproduce the
//   stock dispatch policy.
// - `PolicyConfig` / `NexusConfig` are the compiled, validated, immutable
//   forms the pipeline reads. Terms are lower-cased, regexes compiled, roots
//   canonicalised, scopes checked. Compilation either fully succeeds or
//   returns a fatal ConfigError.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use nx_intent::ActionType;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scope::{self, AgentRole, AuthorityScope};

/// Compiled regexes larger than this are refused.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

const DEFAULT_CLUSTERS: &[&[&str]] = &[
    &["diagnosis", "treatment"],
    &["prescription", "medication"],
    &["medical", "advice"],
    &["triage", "injury", "wound"],
    &["burns", "laceration", "fracture"],
    &["surgery", "procedure", "anesthesia"],
    &["drug", "dosage", "antibiotic"],
    &["patient", "clinical", "symptom"],
    &["diagnose", "treat", "prescribe"],
    &["therapy", "rehabilitation"],
    &["infection", "sterile", "suture"],
];

const DEFAULT_PATTERNS: &[&str] = &[
    r"\b(treat|treating|treated)\b.{0,50}\b(patient|victim|casualty)\b",
    r"\b(prescribe|prescription)\b",
    r"\b(diagnos[ei][sd]?)\b",
    r"\b(medical\s+advice|clinical\s+assessment|clinical\s+diagnosis)\b",
    r"\b(mg|ml|tablet|capsule|injection|iv\s+drip)\b",
    r"\b(burn\s+wound|second[\s\-]degree|third[\s\-]degree)\b",
];

/// Raw policy settings as they appear in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySettings {
    /// Directory that bounds every write. Relative paths resolve against
    /// the config file's directory.
    #[serde(default = "default_root_directory")]
    pub root_directory: PathBuf,

    /// Create missing root directories at load time instead of failing.
    #[serde(default)]
    pub create_root: bool,

    /// Action types the Shield lets through. Everything else is denied.
    #[serde(default = "default_allowed_action_types")]
    pub allowed_action_types: Vec<String>,

    /// A cluster blocks a text only when every one of its terms is present.
    #[serde(default = "default_clusters")]
    pub blocked_keyword_clusters: Vec<Vec<String>>,

    /// Regexes matched case-insensitively against the justification text.
    #[serde(default = "default_patterns")]
    pub blocked_patterns: Vec<String>,

    /// How many components below the root a target may have (1 = direct child).
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_root_directory() -> PathBuf {
    PathBuf::from("outgoing_dispatch")
}

fn default_allowed_action_types() -> Vec<String> {
    vec![ActionType::WriteDispatchLog.as_str().to_string()]
}

fn default_clusters() -> Vec<Vec<String>> {
    DEFAULT_CLUSTERS
        .iter()
        .map(|c| c.iter().map(|t| t.to_string()).collect())
        .collect()
}

fn default_patterns() -> Vec<String> {
    DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect()
}

fn default_max_depth() -> usize {
    1
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            root_directory: default_root_directory(),
            create_root: false,
            allowed_action_types: default_allowed_action_types(),
            blocked_keyword_clusters: default_clusters(),
            blocked_patterns: default_patterns(),
            max_depth: default_max_depth(),
        }
    }
}

impl PolicySettings {
    /// Default settings bounded to `root`.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root_directory: root.into(),
            ..Self::default()
        }
    }

    /// Validate and compile into an immutable [`PolicyConfig`].
    ///
    /// `base_dir` anchors a relative `root_directory`.
    pub fn compile(&self, base_dir: &Path) -> Result<PolicyConfig, ConfigError> {
        let root_directory =
            canonical_root(&base_dir.join(&self.root_directory), self.create_root)?;

        let allowed_action_types = parse_action_types(&self.allowed_action_types)?;
        if allowed_action_types.is_empty() {
            tracing::warn!("policy allowlist is empty; every mission will be denied");
        }

        let blocked_clusters = self
            .blocked_keyword_clusters
            .iter()
            .enumerate()
            .map(|(index, terms)| KeywordCluster::new(index, terms))
            .collect::<Result<Vec<_>, _>>()?;

        let blocked_patterns = self
            .blocked_patterns
            .iter()
            .map(|p| BlockedPattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        if self.max_depth == 0 {
            return Err(ConfigError::InvalidMaxDepth {
                value: self.max_depth,
            });
        }

        Ok(PolicyConfig {
            allowed_action_types,
            blocked_clusters,
            blocked_patterns,
            root_directory,
            max_depth: self.max_depth,
        })
    }
}

/// A conjunctive keyword cluster: fires only when all terms are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordCluster {
    terms: BTreeSet<String>,
}

impl KeywordCluster {
    fn new(index: usize, raw_terms: &[String]) -> Result<Self, ConfigError> {
        let mut terms = BTreeSet::new();
        for raw in raw_terms {
            let term = raw.trim().to_ascii_lowercase();
            if term.is_empty() || !term.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ConfigError::InvalidClusterTerm { term: raw.clone() });
            }
            terms.insert(term);
        }
        if terms.is_empty() {
            return Err(ConfigError::EmptyCluster { index });
        }
        Ok(Self { terms })
    }

    pub fn terms(&self) -> &BTreeSet<String> {
        &self.terms
    }

    /// True when every term of the cluster is in `tokens`.
    pub fn is_matched_by(&self, tokens: &BTreeSet<String>) -> bool {
        self.terms.is_subset(tokens)
    }
}

/// A compiled, case-insensitive blocked pattern.
#[derive(Debug, Clone)]
pub struct BlockedPattern {
    source: String,
    regex: Regex,
}

impl BlockedPattern {
    fn new(source: &str) -> Result<Self, ConfigError> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(true)
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()
            .map_err(|e| ConfigError::InvalidPattern {
                pattern: source.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The first match in `text`, if any.
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.regex.find(text).map(|m| m.as_str())
    }
}

/// The compiled policy. Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    allowed_action_types: BTreeSet<ActionType>,
    blocked_clusters: Vec<KeywordCluster>,
    blocked_patterns: Vec<BlockedPattern>,
    root_directory: PathBuf,
    max_depth: usize,
}

impl PolicyConfig {
    pub fn allowed_action_types(&self) -> &BTreeSet<ActionType> {
        &self.allowed_action_types
    }

    pub fn blocked_clusters(&self) -> &[KeywordCluster] {
        &self.blocked_clusters
    }

    pub fn blocked_patterns(&self) -> &[BlockedPattern] {
        &self.blocked_patterns
    }

    /// Canonical root that bounds all writes.
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

/// Extra breadth the Commander holds beyond what the policy names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommanderSettings {
    #[serde(default = "default_commander_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_commander_extensions() -> Vec<String> {
    ["json", "csv", "txt"].iter().map(|e| e.to_string()).collect()
}

impl Default for CommanderSettings {
    fn default() -> Self {
        Self {
            allowed_extensions: default_commander_extensions(),
        }
    }
}

/// One narrow-authority executor as declared in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAgentSettings {
    pub name: String,

    /// Defaults to the policy root.
    #[serde(default)]
    pub root_directory: Option<PathBuf>,

    #[serde(default = "default_sub_agent_extensions")]
    pub allowed_extensions: Vec<String>,

    #[serde(default = "default_allowed_action_types")]
    pub allowed_action_types: Vec<String>,

    /// Replace an existing file of the same name instead of failing.
    #[serde(default)]
    pub overwrite: bool,
}

fn default_sub_agent_extensions() -> Vec<String> {
    vec!["json".to_string()]
}

fn default_sub_agents() -> Vec<SubAgentSettings> {
    vec![SubAgentSettings::logistics()]
}

impl SubAgentSettings {
    /// The stock dispatch executor: `.json` only, under the policy root.
    pub fn logistics() -> Self {
        Self {
            name: "logistics".to_string(),
            root_directory: None,
            allowed_extensions: default_sub_agent_extensions(),
            allowed_action_types: default_allowed_action_types(),
            overwrite: false,
        }
    }
}

fn default_audit_log() -> PathBuf {
    PathBuf::from("audit.jsonl")
}

/// The whole config file: policy, commander breadth, sub-agents, audit path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NexusFile {
    #[serde(flatten)]
    pub policy: PolicySettings,

    #[serde(default)]
    pub commander: CommanderSettings,

    #[serde(default = "default_sub_agents")]
    pub sub_agents: Vec<SubAgentSettings>,

    #[serde(default = "default_audit_log")]
    pub audit_log: PathBuf,
}

impl Default for NexusFile {
    fn default() -> Self {
        Self {
            policy: PolicySettings::default(),
            commander: CommanderSettings::default(),
            sub_agents: default_sub_agents(),
            audit_log: default_audit_log(),
        }
    }
}

/// A compiled Sub-agent declaration.
#[derive(Debug, Clone)]
pub struct SubAgentConfig {
    pub scope: AuthorityScope,
    pub overwrite: bool,
}

/// Everything a process needs at startup, validated.
#[derive(Debug, Clone)]
pub struct NexusConfig {
    pub policy: PolicyConfig,
    pub commander_extensions: BTreeSet<String>,
    pub sub_agents: Vec<SubAgentConfig>,
    pub audit_log: PathBuf,
}

impl NexusConfig {
    /// Load and validate a config file (`.toml`, `.yaml` or `.yml`).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = NexusFile::read(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let config = file.compile(base_dir)?;
        tracing::info!(
            path = %path.display(),
            root = %config.policy.root_directory().display(),
            sub_agents = config.sub_agents.len(),
            "policy config loaded"
        );
        Ok(config)
    }

    /// The Commander's scope, derived from the policy and its extra breadth.
    pub fn commander_scope(&self) -> AuthorityScope {
        AuthorityScope::commander(&self.policy, self.commander_extensions.clone())
    }
}

impl NexusFile {
    /// Read and parse a config file without compiling it.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_error = |reason: String| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        };
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))
            }
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Compile every section and check the delegation invariants.
    pub fn compile(&self, base_dir: &Path) -> Result<NexusConfig, ConfigError> {
        let policy = self.policy.compile(base_dir)?;
        let commander_extensions =
            scope::normalize_extensions("commander", &self.commander.allowed_extensions)?;

        let mut names = HashSet::new();
        let mut sub_agents = Vec::with_capacity(self.sub_agents.len());
        for settings in &self.sub_agents {
            if !names.insert(settings.name.as_str()) {
                return Err(ConfigError::DuplicateSubAgent {
                    name: settings.name.clone(),
                });
            }
            let root = match &settings.root_directory {
                Some(dir) => canonical_root(&base_dir.join(dir), self.policy.create_root)?,
                None => policy.root_directory().to_path_buf(),
            };
            let scope = AuthorityScope::new(
                AgentRole::SubAgent,
                settings.name.clone(),
                root,
                scope::normalize_extensions(&settings.name, &settings.allowed_extensions)?,
                parse_action_types(&settings.allowed_action_types)?,
            );
            sub_agents.push(SubAgentConfig {
                scope,
                overwrite: settings.overwrite,
            });
        }

        let config = NexusConfig {
            policy,
            commander_extensions,
            sub_agents,
            audit_log: base_dir.join(&self.audit_log),
        };

        let sub_scopes: Vec<AuthorityScope> =
            config.sub_agents.iter().map(|s| s.scope.clone()).collect();
        scope::validate_delegation(
            &config.commander_scope(),
            &sub_scopes,
            config.policy.allowed_action_types(),
        )?;
        Ok(config)
    }
}

fn parse_action_types(raw: &[String]) -> Result<BTreeSet<ActionType>, ConfigError> {
    raw.iter()
        .map(|value| match ActionType::parse(value) {
            ActionType::Unknown => Err(ConfigError::UnknownActionType {
                value: value.clone(),
            }),
            action => Ok(action),
        })
        .collect()
}

fn canonical_root(path: &Path, create: bool) -> Result<PathBuf, ConfigError> {
    if create {
        fs::create_dir_all(path).map_err(|source| ConfigError::RootDirectory {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let canonical = fs::canonicalize(path).map_err(|source| ConfigError::RootDirectory {
        path: path.to_path_buf(),
        source,
    })?;
    if !canonical.is_dir() {
        return Err(ConfigError::RootNotDirectory { path: canonical });
    }
    Ok(canonical)
}
