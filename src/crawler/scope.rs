//! Scope filter deciding which discovered URLs may be queued
//!
//! Checks run cheapest first and the first failing check wins: domain scope,
//! then the visited-set lookup, then the robots policy.

use crate::robots::RobotsPolicy;
use crate::url::{authority_in_scope, CanonicalUrl, ScopeMode};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Why a candidate URL was not queued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Authority outside the crawl scope
    OutOfScope,
    /// Already in the visited set
    Duplicate,
    /// Denied by the robots policy
    PolicyDenied,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfScope => "OUT_OF_SCOPE",
            Self::Duplicate => "DUPLICATE",
            Self::PolicyDenied => "POLICY_DENIED",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_admit(&self) -> bool {
        matches!(self, Self::Admit)
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Admit => None,
            Self::Reject(reason) => Some(*reason),
        }
    }
}

/// Filters candidate URLs against the crawl scope, visited set and robots policy
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    scope_authority: String,
    mode: ScopeMode,
    user_agent: String,
    robots: Arc<dyn RobotsPolicy>,
}

impl ScopeFilter {
    pub fn new(
        scope_authority: impl Into<String>,
        mode: ScopeMode,
        user_agent: impl Into<String>,
        robots: Arc<dyn RobotsPolicy>,
    ) -> Self {
        Self {
            scope_authority: scope_authority.into(),
            mode,
            user_agent: user_agent.into(),
            robots,
        }
    }

    /// The same filter bounded by a different authority
    pub fn rescoped(self, scope_authority: impl Into<String>) -> Self {
        Self {
            scope_authority: scope_authority.into(),
            ..self
        }
    }

    /// The seed authority every candidate is compared against
    pub fn scope_authority(&self) -> &str {
        &self.scope_authority
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Evaluates a canonical candidate against the visited set
    pub fn evaluate(&self, candidate: &CanonicalUrl, visited: &HashSet<CanonicalUrl>) -> Verdict {
        if !authority_in_scope(&self.scope_authority, candidate.authority(), self.mode) {
            return Verdict::Reject(RejectReason::OutOfScope);
        }

        if visited.contains(candidate) {
            return Verdict::Reject(RejectReason::Duplicate);
        }

        if !self.robots.can_fetch(&self.user_agent, candidate.as_str()) {
            return Verdict::Reject(RejectReason::PolicyDenied);
        }

        Verdict::Admit
    }
}
