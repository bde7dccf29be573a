//! Content audit against a static banned-keyword set.
//!
//! The keyword list is compiled once into an Aho-Corasick automaton. A scan runs in time
//! linear in the text length regardless of how many keywords are configured, so the
//! check can sit on every request.
//!
//! # Failure Mode
//!
//! Auditing fails open. Empty text is always safe, and an auditor whose keyword source
//! could not be loaded ([`ContentAuditor::disabled`]) reports every text as safe. The
//! process keeps serving in a degraded state rather than refusing all traffic.
//!
//! # Match Semantics
//!
//! Only the first match is reported: the leftmost-starting occurrence, and among
//! patterns starting at the same position, the one listed first in the keyword source.

use aho_corasick::{AhoCorasick, MatchKind};
use std::{fs, ops::Range, path::Path};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("failed to read keyword file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build keyword matcher: {0}")]
    Build(String),
}

/// Result of scanning one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditVerdict {
    Safe,
    Flagged {
        /// The configured keyword that matched
        keyword: String,
        /// Byte range of the match within the scanned text
        span: Range<usize>,
    },
}

impl AuditVerdict {
    #[must_use]
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }

    #[must_use]
    pub fn matched_keyword(&self) -> Option<&str> {
        match self {
            Self::Safe => None,
            Self::Flagged { keyword, .. } => Some(keyword),
        }
    }
}

/// Immutable multi-pattern matcher over the banned keyword set.
///
/// Shared by reference across all requests; scanning takes `&self` and needs no locking.
#[derive(Debug, Clone)]
pub struct ContentAuditor {
    matcher: Option<AhoCorasick>,
    keywords: Vec<String>,
}

impl ContentAuditor {
    /// Builds an auditor from an in-memory keyword list.
    ///
    /// Keywords are trimmed; blank entries are skipped. An empty list is valid and yields
    /// an auditor that reports everything as safe.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Build`] if the automaton cannot be constructed.
    pub fn from_keywords<I, S>(keywords: I) -> Result<Self, AuditError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        let matcher = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostFirst)
            .build(&keywords)
            .map_err(|e| AuditError::Build(e.to_string()))?;

        Ok(Self { matcher: Some(matcher), keywords })
    }

    /// Loads a newline-delimited keyword file.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] if the file cannot be read, or [`AuditError::Build`] if the
    /// automaton cannot be constructed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AuditError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|source| AuditError::Io { path: path.display().to_string(), source })?;

        let auditor = Self::from_keywords(contents.lines())?;

        if auditor.keywords.is_empty() {
            warn!(path = %path.display(), "keyword file is empty, content audit will pass everything");
        } else {
            info!(keywords = auditor.keywords.len(), "content auditor initialized");
        }

        Ok(auditor)
    }

    /// An auditor with no matcher. Every text is reported safe.
    #[must_use]
    pub fn disabled() -> Self {
        Self { matcher: None, keywords: Vec::new() }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.matcher.is_some()
    }

    #[must_use]
    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }

    /// Scans `text` and reports the first banned keyword found, if any.
    #[must_use]
    pub fn check(&self, text: &str) -> AuditVerdict {
        if text.is_empty() {
            return AuditVerdict::Safe;
        }

        let Some(matcher) = &self.matcher else {
            return AuditVerdict::Safe;
        };

        match matcher.find(text) {
            Some(hit) => {
                let keyword = self.keywords[hit.pattern().as_usize()].clone();
                warn!(keyword = %keyword, "banned keyword detected");
                AuditVerdict::Flagged { keyword, span: hit.start()..hit.end() }
            }
            None => AuditVerdict::Safe,
        }
    }
}
