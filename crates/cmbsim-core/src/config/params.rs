//! The solver-parameter set and its layering rules.
//!
//! Parameters form a two-level tree: top-level scalars plus named groups
//! of scalar leaves. Deeper nesting is unrepresentable, which enforces the
//! two-segment dotted-path limit structurally.

use crate::domain::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// A scalar configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn from_yaml(value: &serde_yaml::Value) -> Option<Self> {
        match value {
            serde_yaml::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Int(i))
                } else {
                    n.as_f64().map(Self::Float)
                }
            }
            serde_yaml::Value::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
        }
    }
}

/// A top-level parameter entry: either a scalar leaf or a named group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamEntry {
    Leaf(ParamValue),
    Group(BTreeMap<String, ParamValue>),
}

/// Result of applying a configuration document layer: which keys landed
/// and which were rejected, with the reason. Rejections are surfaced by
/// the caller rather than swallowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyOutcome {
    pub applied: Vec<String>,
    pub rejected: Vec<(String, String)>,
}

/// Mapping from parameter names to values, with dotted-path access of at
/// most two segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    entries: BTreeMap<String, ParamEntry>,
}

impl ParameterSet {
    /// Built-in baseline: a Planck-2018-like parameter point plus the
    /// solver bookkeeping knobs the assembly stage relies on.
    pub fn baseline() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert("h0".to_string(), ParamEntry::Leaf(ParamValue::Float(67.36)));
        entries.insert(
            "ombh2".to_string(),
            ParamEntry::Leaf(ParamValue::Float(0.02237)),
        );
        entries.insert(
            "omch2".to_string(),
            ParamEntry::Leaf(ParamValue::Float(0.12)),
        );
        entries.insert(
            "tau".to_string(),
            ParamEntry::Leaf(ParamValue::Float(0.0544)),
        );
        entries.insert(
            "alens".to_string(),
            ParamEntry::Leaf(ParamValue::Float(1.0)),
        );
        entries.insert(
            "want_tensors".to_string(),
            ParamEntry::Leaf(ParamValue::Bool(true)),
        );
        entries.insert(
            "do_lensing".to_string(),
            ParamEntry::Leaf(ParamValue::Bool(true)),
        );
        entries.insert(
            "max_l".to_string(),
            ParamEntry::Leaf(ParamValue::Int(10_000)),
        );
        entries.insert(
            "max_l_tensor".to_string(),
            ParamEntry::Leaf(ParamValue::Int(10_000)),
        );

        let mut init_power = BTreeMap::new();
        init_power.insert("a_s".to_string(), ParamValue::Float(2.1e-9));
        init_power.insert("ns".to_string(), ParamValue::Float(0.9649));
        init_power.insert("r".to_string(), ParamValue::Float(0.0));
        entries.insert("init_power".to_string(), ParamEntry::Group(init_power));

        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Looks up a dotted path of at most two segments.
    pub fn get(&self, path: &str) -> Option<&ParamValue> {
        match split_path(path)? {
            (head, None) => match self.entries.get(head)? {
                ParamEntry::Leaf(value) => Some(value),
                ParamEntry::Group(_) => None,
            },
            (head, Some(tail)) => match self.entries.get(head)? {
                ParamEntry::Group(group) => group.get(tail),
                ParamEntry::Leaf(_) => None,
            },
        }
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Sets an existing dotted path. Unknown paths and paths deeper than
    /// two segments are typed errors, never silently skipped.
    pub fn set_path(&mut self, path: &str, value: ParamValue) -> SimResult<()> {
        let Some((head, tail)) = split_path(path) else {
            return Err(SimError::input_validation(
                "CONFIG.PATH_DEPTH",
                format!("parameter path '{path}' exceeds the two-level limit"),
            ));
        };
        match (self.entries.get_mut(head), tail) {
            (Some(ParamEntry::Leaf(slot)), None) => {
                *slot = value;
                Ok(())
            }
            (Some(ParamEntry::Group(group)), Some(leaf)) => match group.get_mut(leaf) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(unknown_key(path)),
            },
            (Some(ParamEntry::Group(_)), None) => Err(SimError::input_validation(
                "CONFIG.GROUP_ASSIGNMENT",
                format!("'{path}' is a parameter group and needs a sub-key"),
            )),
            _ => Err(unknown_key(path)),
        }
    }

    /// Applies one configuration document layer. Scalars assign to leaves
    /// directly; mappings fall back to per-subkey assignment into the
    /// matching group.
    pub fn apply_mapping(&mut self, document: &serde_yaml::Mapping) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        for (key, value) in document {
            let Some(name) = key.as_str() else {
                outcome
                    .rejected
                    .push((format!("{key:?}"), "key is not a string".to_string()));
                continue;
            };
            match value {
                serde_yaml::Value::Mapping(subdoc) => {
                    self.apply_group(name, subdoc, &mut outcome);
                }
                scalar => match ParamValue::from_yaml(scalar) {
                    Some(parsed) => match self.set_path(name, parsed) {
                        Ok(()) => outcome.applied.push(name.to_string()),
                        Err(error) => outcome
                            .rejected
                            .push((name.to_string(), error.message().to_string())),
                    },
                    None => outcome
                        .rejected
                        .push((name.to_string(), "unsupported value type".to_string())),
                },
            }
        }
        outcome
    }

    fn apply_group(
        &mut self,
        name: &str,
        subdoc: &serde_yaml::Mapping,
        outcome: &mut ApplyOutcome,
    ) {
        for (sub_key, sub_value) in subdoc {
            let Some(leaf) = sub_key.as_str() else {
                outcome
                    .rejected
                    .push((name.to_string(), "sub-key is not a string".to_string()));
                continue;
            };
            let path = format!("{name}.{leaf}");
            match ParamValue::from_yaml(sub_value) {
                Some(parsed) => match self.set_path(&path, parsed) {
                    Ok(()) => outcome.applied.push(path),
                    Err(error) => outcome.rejected.push((path, error.message().to_string())),
                },
                None => outcome
                    .rejected
                    .push((path, "unsupported value type".to_string())),
            }
        }
    }

    /// Minimal set of leaves needed to reach `self` starting from
    /// `baseline`. Groups retain only differing leaves.
    pub fn diff(&self, baseline: &Self) -> Self {
        let mut entries = BTreeMap::new();
        for (name, entry) in &self.entries {
            match (entry, baseline.entries.get(name)) {
                (ParamEntry::Leaf(value), Some(ParamEntry::Leaf(base))) => {
                    if value != base {
                        entries.insert(name.clone(), ParamEntry::Leaf(value.clone()));
                    }
                }
                (ParamEntry::Group(group), Some(ParamEntry::Group(base_group))) => {
                    let changed: BTreeMap<String, ParamValue> = group
                        .iter()
                        .filter(|(leaf, value)| base_group.get(*leaf) != Some(value))
                        .map(|(leaf, value)| (leaf.clone(), value.clone()))
                        .collect();
                    if !changed.is_empty() {
                        entries.insert(name.clone(), ParamEntry::Group(changed));
                    }
                }
                (entry, _) => {
                    entries.insert(name.clone(), entry.clone());
                }
            }
        }
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamEntry)> {
        self.entries.iter()
    }
}

fn split_path(path: &str) -> Option<(&str, Option<&str>)> {
    let mut segments = path.split('.');
    let head = segments.next()?;
    let tail = segments.next();
    if segments.next().is_some() {
        return None;
    }
    Some((head, tail))
}

fn unknown_key(path: &str) -> SimError {
    SimError::input_validation(
        "CONFIG.UNKNOWN_KEY",
        format!("'{path}' is not a known solver parameter"),
    )
}

#[cfg(test)]
mod tests {
    use super::{ParamValue, ParameterSet};

    #[test]
    fn baseline_exposes_flat_and_nested_parameters() {
        let params = ParameterSet::baseline();
        assert_eq!(params.get("alens"), Some(&ParamValue::Float(1.0)));
        assert_eq!(params.get("init_power.r"), Some(&ParamValue::Float(0.0)));
        assert!(params.get("init_power").is_none());
        assert!(params.get("init_power.r.extra").is_none());
    }

    #[test]
    fn set_path_updates_flat_and_nested_leaves() {
        let mut params = ParameterSet::baseline();
        params
            .set_path("alens", ParamValue::Float(10.0))
            .expect("flat assignment should succeed");
        params
            .set_path("init_power.r", ParamValue::Float(10.0))
            .expect("nested assignment should succeed");
        assert_eq!(params.get("alens"), Some(&ParamValue::Float(10.0)));
        assert_eq!(params.get("init_power.r"), Some(&ParamValue::Float(10.0)));
    }

    #[test]
    fn set_path_rejects_unknown_and_overdeep_paths() {
        let mut params = ParameterSet::baseline();
        let error = params
            .set_path("alnes", ParamValue::Float(1.0))
            .expect_err("misspelled key should be rejected");
        assert_eq!(error.code(), "CONFIG.UNKNOWN_KEY");

        let error = params
            .set_path("init_power.r.deep", ParamValue::Float(1.0))
            .expect_err("depth-3 path should be rejected");
        assert_eq!(error.code(), "CONFIG.PATH_DEPTH");
    }

    #[test]
    fn apply_mapping_reports_applied_and_rejected_keys() {
        let mut params = ParameterSet::baseline();
        let document: serde_yaml::Mapping = serde_yaml::from_str(
            "
alens: 1.2
init_power:
  r: 0.01
  unknown_leaf: 3.0
bogus: 7
",
        )
        .expect("test document should parse");

        let outcome = params.apply_mapping(&document);
        assert_eq!(outcome.applied, vec!["alens", "init_power.r"]);
        assert_eq!(outcome.rejected.len(), 2);
        assert_eq!(params.get("alens"), Some(&ParamValue::Float(1.2)));
        assert_eq!(params.get("init_power.r"), Some(&ParamValue::Float(0.01)));
    }

    #[test]
    fn diff_keeps_only_changed_leaves() {
        let baseline = ParameterSet::baseline();
        let mut params = baseline.clone();
        params
            .set_path("init_power.r", ParamValue::Float(0.03))
            .expect("assignment should succeed");

        let diff = params.diff(&baseline);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff.get("init_power.r"), Some(&ParamValue::Float(0.03)));
        assert!(diff.get("init_power.ns").is_none());
        assert_eq!(params.diff(&baseline), diff);
    }

    #[test]
    fn parameter_set_round_trips_through_json() {
        let baseline = ParameterSet::baseline();
        let mut params = baseline.clone();
        params
            .set_path("alens", ParamValue::Float(0.5))
            .expect("assignment should succeed");
        let diff = params.diff(&baseline);

        let encoded = serde_json::to_string(&diff).expect("diff should serialize");
        let decoded: ParameterSet =
            serde_json::from_str(&encoded).expect("diff should deserialize");
        assert_eq!(decoded, diff);
    }
}
