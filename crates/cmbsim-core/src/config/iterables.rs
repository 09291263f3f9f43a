//! Sweep-axis expansion.
//!
//! Each entry in the user file's `iterables:` section becomes one sweep
//! axis. Expansion happens once at configuration-load time; the sweep
//! driver only ever sees literal value sequences.

use super::params::ParamValue;
use crate::domain::{SimError, SimResult};
use serde::Deserialize;
use tracing::warn;

/// One swept parameter: the dotted path it updates and the ordered values
/// it takes, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepAxis {
    pub path: String,
    pub values: Vec<ParamValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum AxisScale {
    #[default]
    Linear,
    Log,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RangeSpec {
    #[serde(default)]
    scale: AxisScale,
    range: (f64, f64, usize),
}

/// Expands the `iterables:` mapping into sweep axes, preserving the
/// declaration order of the keys.
pub fn expand_axes(iterables: &serde_yaml::Mapping) -> SimResult<Vec<SweepAxis>> {
    let mut axes = Vec::with_capacity(iterables.len());
    for (key, value) in iterables {
        let Some(path) = key.as_str() else {
            return Err(SimError::input_validation(
                "CONFIG.ITERABLE_KEY",
                format!("iterable key {key:?} is not a string"),
            ));
        };
        axes.push(SweepAxis {
            path: path.to_string(),
            values: expand_axis_values(path, value)?,
        });
    }
    Ok(axes)
}

fn expand_axis_values(path: &str, value: &serde_yaml::Value) -> SimResult<Vec<ParamValue>> {
    match value {
        serde_yaml::Value::Sequence(sequence) => expand_sequence(path, sequence),
        serde_yaml::Value::Mapping(_) => {
            let spec: RangeSpec = serde_yaml::from_value(value.clone()).map_err(|source| {
                SimError::input_validation(
                    "CONFIG.ITERABLE_RANGE",
                    format!("iterable '{path}' has an invalid range spec: {source}"),
                )
            })?;
            let (start, stop, count) = spec.range;
            Ok(match spec.scale {
                AxisScale::Linear => linspace(start, stop, count),
                AxisScale::Log => logspace(start, stop, count),
            })
        }
        scalar => match ParamValue::from_yaml(scalar) {
            Some(single) => {
                warn!(path, "iterable value is not a sequence; coercing to one element");
                Ok(vec![single])
            }
            None => Err(SimError::input_validation(
                "CONFIG.ITERABLE_VALUE",
                format!("iterable '{path}' has an unsupported value type"),
            )),
        },
    }
}

/// A 3-element sequence whose last element is an integer count expands to
/// that many linearly spaced points between the bounds; anything else is
/// taken literally.
fn expand_sequence(path: &str, sequence: &[serde_yaml::Value]) -> SimResult<Vec<ParamValue>> {
    if sequence.len() == 3 {
        if let (Some(start), Some(stop), serde_yaml::Value::Number(tail)) =
            (sequence[0].as_f64(), sequence[1].as_f64(), &sequence[2])
        {
            if !tail.is_f64() {
                if let Some(count) = tail.as_u64() {
                    return Ok(linspace(start, stop, count as usize));
                }
            }
        }
    }

    sequence
        .iter()
        .map(|element| {
            ParamValue::from_yaml(element).ok_or_else(|| {
                SimError::input_validation(
                    "CONFIG.ITERABLE_VALUE",
                    format!("iterable '{path}' contains a non-scalar element"),
                )
            })
        })
        .collect()
}

fn linspace(start: f64, stop: f64, count: usize) -> Vec<ParamValue> {
    if count == 0 {
        return Vec::new();
    }
    if count == 1 {
        return vec![ParamValue::Float(start)];
    }
    let step = (stop - start) / (count - 1) as f64;
    (0..count)
        .map(|index| ParamValue::Float(start + step * index as f64))
        .collect()
}

fn logspace(start_decade: f64, stop_decade: f64, count: usize) -> Vec<ParamValue> {
    linspace(start_decade, stop_decade, count)
        .into_iter()
        .map(|value| match value {
            ParamValue::Float(exponent) => ParamValue::Float(10.0_f64.powf(exponent)),
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{expand_axes, ParamValue};

    fn axes_from(yaml: &str) -> Vec<super::SweepAxis> {
        let mapping: serde_yaml::Mapping = serde_yaml::from_str(yaml).expect("yaml should parse");
        expand_axes(&mapping).expect("axes should expand")
    }

    fn floats(axis: &super::SweepAxis) -> Vec<f64> {
        axis.values
            .iter()
            .map(|value| value.as_f64().expect("axis value should be numeric"))
            .collect()
    }

    #[test]
    fn declaration_order_is_preserved() {
        let axes = axes_from("alens: [0.5, 1.0]\ninit_power.r: [0.0, 0.1]\n");
        assert_eq!(axes[0].path, "alens");
        assert_eq!(axes[1].path, "init_power.r");
    }

    #[test]
    fn three_element_integer_tail_expands_linearly() {
        let axes = axes_from("alens: [0.0, 1.0, 5]\n");
        assert_eq!(floats(&axes[0]), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn float_tail_is_a_literal_sequence() {
        let axes = axes_from("alens: [0.0, 1.0, 5.0]\n");
        assert_eq!(floats(&axes[0]), vec![0.0, 1.0, 5.0]);
    }

    #[test]
    fn log_scale_range_hits_both_decade_endpoints() {
        let axes = axes_from("init_power.r: {scale: log, range: [-4, -1, 4]}\n");
        let values = floats(&axes[0]);
        assert_eq!(values.len(), 4);
        assert!((values[0] - 1.0e-4).abs() < 1.0e-16);
        assert!((values[3] - 1.0e-1).abs() < 1.0e-12);
    }

    #[test]
    fn scalar_iterable_coerces_to_one_element() {
        let axes = axes_from("alens: 0.7\n");
        assert_eq!(axes[0].values, vec![ParamValue::Float(0.7)]);
    }

    #[test]
    fn non_scalar_elements_are_rejected() {
        let mapping: serde_yaml::Mapping =
            serde_yaml::from_str("alens: [[0.0], [1.0]]\n").expect("yaml should parse");
        let error = expand_axes(&mapping).expect_err("nested sequences should be rejected");
        assert_eq!(error.code(), "CONFIG.ITERABLE_VALUE");
    }
}
