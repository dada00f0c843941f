use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::glob_pattern::GlobPattern;
use crate::history_replay::{Binding, ExclusionSets, WatchState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Why an invocation was scheduled.
pub enum InvocationTrigger {
    Manual,
    FileChange,
    AutoPatternMatch,
}

impl InvocationTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::FileChange => "file_change",
            Self::AutoPatternMatch => "auto_pattern_match",
        }
    }
}

impl std::fmt::Display for InvocationTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A candidate file selected by one binding.
pub struct BindingMatch {
    pub file_path: String,
    pub agent: String,
    pub args: String,
    pub source_pattern: String,
    pub source_pr: u64,
}

impl BindingMatch {
    pub fn into_invocation(
        self,
        pr_number: u64,
        comment_id: Option<u64>,
        trigger: InvocationTrigger,
    ) -> Invocation {
        Invocation {
            file_path: Some(self.file_path),
            agent: self.agent,
            args: self.args,
            pr_number,
            comment_id,
            trigger,
            source_pattern: Some(self.source_pattern),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One resolved agent execution request. Never persisted.
pub struct Invocation {
    pub file_path: Option<String>,
    pub agent: String,
    pub args: String,
    pub pr_number: u64,
    /// Originating comment; `None` for invocations scheduled by replay.
    pub comment_id: Option<u64>,
    pub trigger: InvocationTrigger,
    pub source_pattern: Option<String>,
}

/// Matches `bindings` against `paths`, honouring per-agent exclusions.
///
/// Results are deduplicated on `(file, agent)`; the first binding in stored
/// order wins. Bindings that select nothing are simply skipped.
pub fn match_bindings<P: AsRef<str>>(
    bindings: &[Binding],
    exclusions: &ExclusionSets,
    paths: &[P],
) -> Vec<BindingMatch> {
    let mut exclusion_cache: HashMap<&str, Vec<GlobPattern>> = HashMap::new();
    let mut seen = HashSet::new();
    let mut matches = Vec::new();
    for binding in bindings {
        let pattern = GlobPattern::compile(&binding.pattern);
        if !pattern.is_valid() {
            continue;
        }
        let excluded = exclusion_cache
            .entry(binding.agent.as_str())
            .or_insert_with(|| {
                exclusions
                    .patterns_for(&binding.agent)
                    .map(GlobPattern::compile)
                    .collect()
            });
        for path in paths {
            let path = path.as_ref();
            if !pattern.is_match(path) || excluded.iter().any(|veto| veto.is_match(path)) {
                continue;
            }
            if !seen.insert((path.to_string(), binding.agent.clone())) {
                continue;
            }
            matches.push(BindingMatch {
                file_path: path.to_string(),
                agent: binding.agent.clone(),
                args: binding.args.clone(),
                source_pattern: binding.pattern.clone(),
                source_pr: binding.source_pr,
            });
        }
    }
    matches
}

impl WatchState {
    /// Matches every active binding against `paths`.
    pub fn match_paths<P: AsRef<str>>(&self, paths: &[P]) -> Vec<BindingMatch> {
        match_bindings(self.bindings(), self.exclusions(), paths)
    }
}
