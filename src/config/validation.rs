//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Unknown keys are found on the raw `toml::Value` tree before serde runs and
//! only ever produce warnings. Range problems are hard errors.

use std::collections::HashSet;

use super::{defaults, RingConfig};

/// A non-fatal config warning (typo, unknown section).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path of `RingConfig`.
///
/// Must be kept in step with the structs in `ring_config.rs`.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [virtual_strips]
        "virtual_strips",
        "virtual_strips.gap_tolerance",
        "virtual_strips.pitch_deg",
        // [connections]
        "connections",
        "connections.overflow_policy",
        "connections.reference_hw_plane",
        // [output]
        "output",
        "output.pretty_json",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively collect all dotted key paths of a `toml::Value` tree.
///
/// `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let b_len = b_chars.len();
    if a.is_empty() {
        return b_len;
    }
    if b_len == 0 {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Closest known key within edit distance 3, if any.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, levenshtein(unknown, k)))
        .filter(|&(_, dist)| dist <= 3)
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

/// Warnings for every key in `raw_toml` that `RingConfig` does not know.
///
/// Parse errors return no warnings; serde reports them afterwards.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

/// Hard errors for values the builder cannot work with.
pub fn validate_ranges(config: &RingConfig) -> Vec<String> {
    let mut errors = Vec::new();
    let vs = &config.virtual_strips;

    if !vs.gap_tolerance.is_finite() || vs.gap_tolerance < defaults::MIN_GAP_TOLERANCE {
        errors.push(format!(
            "virtual_strips.gap_tolerance = {} must be a finite value >= {:.1}",
            vs.gap_tolerance,
            defaults::MIN_GAP_TOLERANCE
        ));
    }

    if let Some(pitch) = vs.pitch_deg {
        if !(defaults::MIN_PITCH_DEG..=defaults::MAX_PITCH_DEG).contains(&pitch) {
            errors.push(format!(
                "virtual_strips.pitch_deg = {pitch} is outside [{}, {}] degrees",
                defaults::MIN_PITCH_DEG,
                defaults::MAX_PITCH_DEG
            ));
        }
    }

    let plane = config.connections.reference_hw_plane;
    if !(1..=crate::tables::NHPLANES as u8).contains(&plane) {
        errors.push(format!(
            "connections.reference_hw_plane = {plane} is outside 1..={}",
            crate::tables::NHPLANES
        ));
    }

    errors
}
