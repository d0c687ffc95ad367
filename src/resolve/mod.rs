//! Dependency resolution over enumerated candidates

pub mod candidate;
pub mod resolver;

pub use candidate::{Candidate, CandidateSet};
pub use resolver::{ResolveError, Resolver, ResolverConfig};
