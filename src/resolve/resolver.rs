//! Backtracking dependency resolver.
//!
//! Picks exactly one candidate per reachable package such that every
//! constraint holds, including the source each root requirement names.
//! The search is a pure function over an immutable [`CandidateSet`]:
//! every branch works on its own copy of the partial assignment, so
//! backtracking is just returning.

use crate::error::PinionError;
use crate::manifest::Requirement;
use crate::resolve::candidate::{Candidate, CandidateSet};
use semver::{Version, VersionReq};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, trace};

/// Error type for resolution failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("version conflict for {package}: {}", .constraints.join("; "))]
    Conflict {
        package: String,
        constraints: Vec<String>,
    },

    #[error("no candidates for {package} in {searched}")]
    MissingSource { package: String, searched: String },

    #[error("resolution exhausted after {steps} steps")]
    Exhausted { steps: usize },
}

impl From<ResolveError> for PinionError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Conflict {
                package,
                constraints,
            } => PinionError::Conflict {
                package,
                constraints,
            },
            ResolveError::MissingSource { package, searched } => {
                PinionError::MissingSource { package, searched }
            }
            ResolveError::Exhausted { steps } => PinionError::ResolutionExhausted { steps },
        }
    }
}

/// Configuration for the resolver
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum number of search steps before giving up
    pub max_steps: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { max_steps: 100_000 }
    }
}

/// A constraint on one package and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
struct Constraint {
    req: VersionReq,
    /// Required source; only root requirements carry one
    source: Option<String>,
    origin: String,
}

impl Constraint {
    fn allows(&self, candidate: &Candidate) -> bool {
        self.req.matches(&candidate.version)
            && self.source.as_ref().map_or(true, |s| *s == candidate.source)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} from source {} required by {}", self.req, source, self.origin),
            None => write!(f, "{} required by {}", self.req, self.origin),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    constraints: BTreeMap<String, Vec<Constraint>>,
    selected: BTreeMap<String, Candidate>,
}

impl State {
    fn next_unselected(&self) -> Option<&str> {
        self.constraints
            .keys()
            .find(|name| !self.selected.contains_key(*name))
            .map(String::as_str)
    }

    fn constrain(&mut self, name: &str, constraint: Constraint) {
        self.constraints
            .entry(name.to_string())
            .or_default()
            .push(constraint);
    }
}

/// Why a branch of the search died
enum Failure {
    /// No candidate fits the constraints on `package`
    DeadEnd {
        package: String,
        constraints: Vec<Constraint>,
    },
    Exhausted,
}

/// The dependency resolver
pub struct Resolver<'a> {
    candidates: &'a CandidateSet,
    /// Previously locked versions of unlocked packages, tried first
    preferred: &'a BTreeMap<String, Version>,
    config: ResolverConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(candidates: &'a CandidateSet, preferred: &'a BTreeMap<String, Version>) -> Self {
        Self {
            candidates,
            preferred,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve the root requirements into one candidate per package
    pub fn resolve(&self, requirements: &[Requirement]) -> Result<BTreeMap<String, Candidate>, ResolveError> {
        let mut state = State::default();
        for requirement in requirements {
            state.constrain(
                &requirement.name,
                Constraint {
                    req: requirement.constraint.clone(),
                    source: Some(requirement.source.clone()),
                    origin: requirement.origin(),
                },
            );
        }

        let mut steps = 0;
        match self.search(state, &mut steps) {
            Ok(state) => {
                debug!("Resolved {} packages in {} steps", state.selected.len(), steps);
                Ok(state.selected)
            }
            Err(Failure::Exhausted) => Err(ResolveError::Exhausted { steps }),
            Err(Failure::DeadEnd {
                package,
                constraints,
            }) => Err(self.explain(package, constraints)),
        }
    }

    fn search(&self, state: State, steps: &mut usize) -> Result<State, Failure> {
        *steps += 1;
        if *steps > self.config.max_steps {
            return Err(Failure::Exhausted);
        }

        let Some(name) = state.next_unselected().map(str::to_string) else {
            return Ok(state);
        };
        let constraints = state.constraints.get(&name).cloned().unwrap_or_default();
        let choices = self.ordered_choices(&name, &constraints);
        trace!("{}: {} viable candidates", name, choices.len());

        let mut first_failure = None;
        for candidate in choices {
            trace!("Trying {} {} from {}", candidate.name, candidate.version, candidate.source);
            let next = match self.select(&state, candidate) {
                Ok(next) => next,
                Err(failure) => {
                    first_failure.get_or_insert(failure);
                    continue;
                }
            };
            match self.search(next, steps) {
                Ok(done) => return Ok(done),
                Err(Failure::Exhausted) => return Err(Failure::Exhausted),
                Err(failure) => {
                    first_failure.get_or_insert(failure);
                }
            }
        }

        Err(first_failure.unwrap_or(Failure::DeadEnd {
            package: name,
            constraints,
        }))
    }

    /// Candidates for `name` that satisfy every constraint, best first
    fn ordered_choices(&self, name: &str, constraints: &[Constraint]) -> Vec<&'a Candidate> {
        let preferred = self.preferred.get(name);
        let mut choices: Vec<&Candidate> = self
            .candidates
            .get(name)
            .iter()
            .filter(|c| constraints.iter().all(|k| k.allows(c)))
            .collect();

        choices.sort_by(|a, b| {
            let a_pref = preferred == Some(&a.version);
            let b_pref = preferred == Some(&b.version);
            b_pref
                .cmp(&a_pref)
                .then_with(|| b.version.cmp(&a.version))
                .then_with(|| {
                    let a_index = self.candidates.is_index(&a.source);
                    let b_index = self.candidates.is_index(&b.source);
                    a_index.cmp(&b_index)
                })
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.revision.cmp(&b.revision))
        });
        choices
    }

    /// Commit to `candidate` and add its dependency constraints
    fn select(&self, state: &State, candidate: &Candidate) -> Result<State, Failure> {
        let mut next = state.clone();
        next.selected
            .insert(candidate.name.clone(), candidate.clone());

        let origin = format!("{} {}", candidate.name, candidate.version);
        for (dep, req) in &candidate.dependencies {
            next.constrain(
                dep,
                Constraint {
                    req: req.clone(),
                    source: None,
                    origin: origin.clone(),
                },
            );
            if let Some(chosen) = next.selected.get(dep) {
                if !req.matches(&chosen.version) {
                    trace!("{} conflicts with selected {} {}", origin, dep, chosen.version);
                    return Err(Failure::DeadEnd {
                        package: dep.clone(),
                        constraints: next.constraints.get(dep).cloned().unwrap_or_default(),
                    });
                }
            }
        }
        Ok(next)
    }

    /// Turn a dead end into a user-facing error
    fn explain(&self, package: String, constraints: Vec<Constraint>) -> ResolveError {
        let available = self.candidates.get(&package);
        let sources: BTreeSet<&String> = constraints.iter().filter_map(|c| c.source.as_ref()).collect();

        let reachable = available
            .iter()
            .any(|c| sources.iter().all(|s| **s == c.source));
        // Two different declared sources is a conflict between requirements
        if !reachable && sources.len() <= 1 {
            let searched = match sources.first() {
                Some(source) => format!("source {}", source),
                None => {
                    let all: Vec<&str> = self.candidates.sources().collect();
                    format!("any source ({})", all.join(", "))
                }
            };
            return ResolveError::MissingSource { package, searched };
        }

        let minimal = self.minimize(&package, constraints);
        let mut lines: Vec<String> = minimal.iter().map(Constraint::to_string).collect();
        if self.candidates.is_pinned(&package) {
            for c in available {
                lines.push(format!("{} locked at {} from source {}", package, c.version, c.source));
            }
        }
        ResolveError::Conflict {
            package,
            constraints: lines,
        }
    }

    /// Drop constraints one at a time while the rest stay unsatisfiable
    fn minimize(&self, package: &str, mut constraints: Vec<Constraint>) -> Vec<Constraint> {
        let unsatisfiable = |set: &[Constraint]| {
            !self
                .candidates
                .get(package)
                .iter()
                .any(|c| set.iter().all(|k| k.allows(c)))
        };

        if !unsatisfiable(&constraints) {
            return constraints;
        }

        let mut i = 0;
        while i < constraints.len() {
            let mut without = constraints.clone();
            without.remove(i);
            if !without.is_empty() && unsatisfiable(&without) {
                constraints = without;
            } else {
                i += 1;
            }
        }
        constraints
    }
}
