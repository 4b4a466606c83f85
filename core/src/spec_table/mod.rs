//! Pipe diameter to support spacing table.
//!
//! The table is loaded from a flat text source, one rule per line:
//! `<diameter> <spacing>`, both in millimetres. Loading is fail-fast: the
//! first malformed line rejects the whole table.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;


/// One diameter/spacing pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpacingRule {
    pub diameter: f64,
    pub spacing: f64,
}

/// How a pipe diameter is matched against the table.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiameterMatch {
    /// Bitwise float equality. Matches what existing spec files expect.
    #[default]
    Exact,
    /// Closest rule within the given absolute tolerance (mm).
    Tolerance(f64),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpecParseErrorKind {
    #[error("expected 2 tokens, found {0}")]
    TokenCount(usize),

    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("diameter must be positive, got {0}")]
    NonPositiveDiameter(f64),

    #[error("spacing must not be negative, got {0}")]
    NegativeSpacing(f64),

    #[error("duplicate diameter {0}")]
    DuplicateDiameter(f64),
}

/// A rejected spec line. `line` is 1-based.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Spec line {line}: {kind}")]
pub struct SpecParseError {
    pub line: usize,
    pub kind: SpecParseErrorKind,
}

#[derive(Debug, Error)]
pub enum SpecLoadError {
    #[error("Cannot read spec file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] SpecParseError),
}

/// Ordered set of spacing rules with unique diameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecTable {
    rules: Vec<SpacingRule>,
}

impl SpecTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the whole text source. Blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self, SpecParseError> {
        Self::parse_lines(text.lines())
    }

    pub fn parse_lines<I, S>(lines: I) -> Result<Self, SpecParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for (idx, line) in lines.into_iter().enumerate() {
            let line_no = idx + 1;
            let line = line.as_ref();
            if line.trim().is_empty() {
                continue;
            }
            let rule = parse_rule(line).map_err(|kind| SpecParseError { line: line_no, kind })?;
            table
                .insert(rule)
                .map_err(|kind| SpecParseError { line: line_no, kind })?;
        }
        Ok(table)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SpecLoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SpecLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::parse(&text)?;
        tracing::info!("Loaded {} spacing rules from {:?}", table.len(), path);
        Ok(table)
    }

    /// Add a rule, rejecting a diameter that is already present.
    pub fn insert(&mut self, rule: SpacingRule) -> Result<(), SpecParseErrorKind> {
        if rule.diameter <= 0.0 {
            return Err(SpecParseErrorKind::NonPositiveDiameter(rule.diameter));
        }
        if rule.spacing < 0.0 {
            return Err(SpecParseErrorKind::NegativeSpacing(rule.spacing));
        }
        if self.rules.iter().any(|r| r.diameter == rule.diameter) {
            return Err(SpecParseErrorKind::DuplicateDiameter(rule.diameter));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Spacing for an exact diameter match.
    pub fn lookup(&self, diameter: f64) -> Option<f64> {
        self.rules
            .iter()
            .find(|r| r.diameter == diameter)
            .map(|r| r.spacing)
    }

    pub fn lookup_with(&self, diameter: f64, matching: DiameterMatch) -> Option<f64> {
        match matching {
            DiameterMatch::Exact => self.lookup(diameter),
            DiameterMatch::Tolerance(tol) => self
                .rules
                .iter()
                .map(|r| ((r.diameter - diameter).abs(), r.spacing))
                .filter(|(delta, _)| *delta <= tol)
                .min_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(_, spacing)| spacing),
        }
    }

    pub fn rules(&self) -> &[SpacingRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn parse_rule(line: &str) -> Result<SpacingRule, SpecParseErrorKind> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 2 {
        return Err(SpecParseErrorKind::TokenCount(tokens.len()));
    }
    Ok(SpacingRule {
        diameter: parse_number(tokens[0])?,
        spacing: parse_number(tokens[1])?,
    })
}

fn parse_number(token: &str) -> Result<f64, SpecParseErrorKind> {
    match token.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(SpecParseErrorKind::NotANumber(token.to_string())),
    }
}
