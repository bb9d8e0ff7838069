//! Response database
//!
//! Loads a response definition file into a table mapping exact request
//! telegrams to recorded response telegrams:
//!
//! ```text
//! ; comment
//! 82 12 F1 1A 80 1F : 83 F1 12 5A 80 00 58
//! ```
//!
//! Bytes left of `:` are the request to match, bytes right of it are one
//! or more concatenated response telegrams. The table is immutable once
//! loaded and is shared read-only with the engine thread.

mod parser;

use crate::error::{Result, SimError};
use crate::framer::{self, Concept, FrameLength};
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

// =============================================================================
// Warnings
// =============================================================================

/// Non-fatal finding while loading a definition file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// 1-based line number in the definition file
    pub line: usize,
    pub kind: WarningKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    /// Token is not a hex byte, it was skipped
    InvalidToken { token: String },
    /// Line has compare bytes or response bytes but not both
    IncompleteLine,
    /// Request length disagrees with its header (`expected` is None when
    /// the header itself is unreadable)
    RequestLength {
        expected: Option<usize>,
        actual: usize,
    },
    /// Response bytes do not split into whole telegrams
    InexactSplit { consumed: usize, total: usize },
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: ", self.line)?;
        match &self.kind {
            WarningKind::InvalidToken { token } => write!(f, "invalid token '{}'", token),
            WarningKind::IncompleteLine => write!(f, "missing compare or response bytes"),
            WarningKind::RequestLength {
                expected: Some(expected),
                actual,
            } => write!(
                f,
                "request length {} does not match header length {}",
                actual, expected
            ),
            WarningKind::RequestLength {
                expected: None,
                actual,
            } => write!(f, "request of {} bytes has no valid header", actual),
            WarningKind::InexactSplit { consumed, total } => write!(
                f,
                "response splits into telegrams covering {} of {} bytes",
                consumed, total
            ),
        }
    }
}

// =============================================================================
// Table
// =============================================================================

/// Recorded answer to one request telegram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEntry {
    /// Exact request telegram to match
    pub request: Bytes,
    /// Concatenated response telegrams
    pub response: Bytes,
    /// `response` split into single telegrams
    pub response_list: Vec<Bytes>,
    /// Definition line the entry came from
    pub line: usize,
}

/// Deduplicated request -> response table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseTable {
    concept: Concept,
    entries: Vec<ResponseEntry>,
    index: HashMap<Bytes, usize>,
    warnings: Vec<ParseWarning>,
}

impl ResponseTable {
    /// Table without entries: every request goes to synthesis or fallback
    pub fn empty(concept: Concept) -> Self {
        Self {
            concept,
            ..Self::default()
        }
    }

    /// Load a definition file
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read. Malformed content never
    /// fails the load, see [`warnings`](Self::warnings).
    pub fn load(path: impl AsRef<Path>, concept: Concept) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read(path).map_err(|e| SimError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let table = Self::parse(&String::from_utf8_lossy(&raw), concept);

        for w in &table.warnings {
            warn!("{}: {}", path.display(), w);
        }
        info!(
            "Loaded {} responses from {} ({} warnings)",
            table.len(),
            path.display(),
            table.warnings.len()
        );
        Ok(table)
    }

    /// Parse definition text
    pub fn parse(text: &str, concept: Concept) -> Self {
        let mut table = Self::empty(concept);
        let mut pending = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            if let Some(candidate) = parser::parse_line(line, idx + 1, &mut table.warnings) {
                pending.push(candidate);
            }
        }
        for candidate in pending {
            table.merge(candidate.compare, candidate.response, candidate.line);
        }
        table.split_responses();
        table
    }

    /// Insert or replace, keeping the longest response per request
    fn merge(&mut self, request: Vec<u8>, response: Vec<u8>, line: usize) {
        if let Some(&i) = self.index.get(request.as_slice()) {
            let existing = &mut self.entries[i];
            if existing.response.len() < response.len() {
                debug!(
                    "line {}: replaces shorter response from line {}",
                    line, existing.line
                );
                existing.response = Bytes::from(response);
                existing.line = line;
            } else {
                debug!("line {}: duplicate of line {} ignored", line, existing.line);
            }
            return;
        }

        let request = Bytes::from(request);
        self.index.insert(request.clone(), self.entries.len());
        self.entries.push(ResponseEntry {
            request,
            response: Bytes::from(response),
            response_list: Vec::new(),
            line,
        });
    }

    /// Validate request lengths and split responses into telegrams
    fn split_responses(&mut self) {
        for entry in &mut self.entries {
            match framer::frame_length(&entry.request, 0, self.concept) {
                FrameLength::Complete(n) if n == entry.request.len() => {}
                FrameLength::Complete(n) => self.warnings.push(ParseWarning {
                    line: entry.line,
                    kind: WarningKind::RequestLength {
                        expected: Some(n),
                        actual: entry.request.len(),
                    },
                }),
                FrameLength::Incomplete | FrameLength::Malformed => {
                    self.warnings.push(ParseWarning {
                        line: entry.line,
                        kind: WarningKind::RequestLength {
                            expected: None,
                            actual: entry.request.len(),
                        },
                    })
                }
            }

            let seg = framer::segment(&entry.response, self.concept);
            if !seg.is_exact(entry.response.len()) {
                self.warnings.push(ParseWarning {
                    line: entry.line,
                    kind: WarningKind::InexactSplit {
                        consumed: seg.consumed,
                        total: entry.response.len(),
                    },
                });
            }
            entry.response_list = seg.telegrams;
        }
    }

    /// Entry whose request equals `request` exactly
    pub fn lookup(&self, request: &[u8]) -> Option<&ResponseEntry> {
        self.index.get(request).map(|&i| &self.entries[i])
    }

    /// All entries in definition order
    pub fn entries(&self) -> &[ResponseEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Concept the responses were split for
    pub fn concept(&self) -> Concept {
        self.concept
    }

    /// Non-fatal findings collected while loading
    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }
}

// =============================================================================
// Tests
// =============================================================================
