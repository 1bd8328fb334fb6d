//! Parameter binding and output extraction.
//!
//! Parameters are declared as an ordered spec of concrete values and
//! carry-forward markers, then bound into the provider wire format for a
//! specific operation. Outputs are looked up by key, never by position.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ParameterError, Result};

/// The operation a parameter list is bound for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOperation {
    /// Stack creation.
    Create,
    /// Stack update.
    Update,
}

/// Value side of a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterValue {
    /// An explicit value.
    Concrete(String),
    /// Keep whatever value the stack currently holds.
    CarryForward,
}

/// A single stack parameter.
///
/// Serialises as `{"ParameterKey", "ParameterValue"}` or
/// `{"ParameterKey", "UsePreviousValue": true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireParameter", into = "WireParameter")]
pub struct Parameter {
    /// Parameter key.
    pub key: String,
    /// Parameter value.
    pub value: ParameterValue,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireParameter {
    parameter_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parameter_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    use_previous_value: Option<bool>,
}

impl TryFrom<WireParameter> for Parameter {
    type Error = String;

    fn try_from(wire: WireParameter) -> std::result::Result<Self, Self::Error> {
        let value = match (wire.parameter_value, wire.use_previous_value) {
            (Some(value), None | Some(false)) => ParameterValue::Concrete(value),
            (None, Some(true)) => ParameterValue::CarryForward,
            (Some(_), Some(true)) => {
                return Err(format!(
                    "parameter {} has both a value and UsePreviousValue",
                    wire.parameter_key
                ));
            }
            (None, None | Some(false)) => {
                return Err(format!("parameter {} has no value", wire.parameter_key));
            }
        };
        Ok(Self {
            key: wire.parameter_key,
            value,
        })
    }
}

impl From<Parameter> for WireParameter {
    fn from(parameter: Parameter) -> Self {
        match parameter.value {
            ParameterValue::Concrete(value) => Self {
                parameter_key: parameter.key,
                parameter_value: Some(value),
                use_previous_value: None,
            },
            ParameterValue::CarryForward => Self {
                parameter_key: parameter.key,
                parameter_value: None,
                use_previous_value: Some(true),
            },
        }
    }
}

impl Parameter {
    /// Creates a concrete parameter.
    #[must_use]
    pub fn concrete(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: ParameterValue::Concrete(value.into()),
        }
    }

    /// Creates a carry-forward parameter.
    #[must_use]
    pub fn carry_forward(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: ParameterValue::CarryForward,
        }
    }

    /// Returns the concrete value, if any.
    #[must_use]
    pub fn concrete_value(&self) -> Option<&str> {
        match &self.value {
            ParameterValue::Concrete(value) => Some(value),
            ParameterValue::CarryForward => None,
        }
    }
}

/// Declarative, insertion-ordered parameter spec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSpec {
    entries: Vec<(String, ParameterValue)>,
}

impl ParameterSpec {
    /// Creates an empty spec.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Sets a key, replacing an earlier entry in place.
    pub fn set(&mut self, key: impl Into<String>, value: ParameterValue) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Adds a concrete value.
    #[must_use]
    pub fn value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, ParameterValue::Concrete(value.into()));
        self
    }

    /// Adds a carry-forward marker.
    #[must_use]
    pub fn carry_forward(mut self, key: impl Into<String>) -> Self {
        self.set(key, ParameterValue::CarryForward);
        self
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the spec is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Key-indexed stack outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackOutputs(BTreeMap<String, String>);

impl StackOutputs {
    /// Creates an empty output set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Looks up an output.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Inserts an output.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Removes an output.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Iterates outputs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of outputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no outputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StackOutputs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Builds parameter lists and extracts outputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParameterBinder;

impl ParameterBinder {
    /// Creates a new binder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Binds a spec into an ordered parameter list for an operation.
    ///
    /// # Errors
    ///
    /// Returns an error if a carry-forward marker is bound for a create.
    pub fn build_parameters(
        &self,
        spec: &ParameterSpec,
        operation: StackOperation,
    ) -> Result<Vec<Parameter>> {
        spec.entries
            .iter()
            .map(|(key, value)| match (value, operation) {
                (ParameterValue::CarryForward, StackOperation::Create) => {
                    Err(ParameterError::CarryForwardOnCreate { key: key.clone() }.into())
                }
                _ => Ok(Parameter {
                    key: key.clone(),
                    value: value.clone(),
                }),
            })
            .collect()
    }

    /// Extracts a named output.
    ///
    /// # Errors
    ///
    /// Returns `OutputNotFound` if no output has that key.
    pub fn extract_output(&self, key: &str, outputs: &StackOutputs) -> Result<String> {
        outputs.get(key).map(str::to_string).ok_or_else(|| {
            ParameterError::OutputNotFound {
                key: key.to_string(),
                available: outputs
                    .iter()
                    .map(|(k, _)| k)
                    .collect::<Vec<_>>()
                    .join(", "),
            }
            .into()
        })
    }

    /// Builds an update spec from a persisted list: every known key carries
    /// forward except the overrides, which become concrete. Override keys the
    /// stack did not know before are appended.
    #[must_use]
    pub fn carry_forward_except(
        &self,
        known: &[Parameter],
        overrides: &[(String, String)],
    ) -> ParameterSpec {
        let mut spec = ParameterSpec::new();
        for parameter in known {
            spec.set(parameter.key.clone(), ParameterValue::CarryForward);
        }
        for (key, value) in overrides {
            spec.set(key.clone(), ParameterValue::Concrete(value.clone()));
        }
        spec
    }

    /// Folds the concrete values of an applied list into the persisted list.
    ///
    /// Carry-forward entries keep their persisted value; new keys are
    /// appended in applied order.
    #[must_use]
    pub fn merge_persisted(&self, known: &[Parameter], applied: &[Parameter]) -> Vec<Parameter> {
        let mut merged = known.to_vec();
        for parameter in applied {
            let ParameterValue::Concrete(value) = &parameter.value else {
                continue;
            };
            if let Some(existing) = merged.iter_mut().find(|p| p.key == parameter.key) {
                existing.value = ParameterValue::Concrete(value.clone());
            } else {
                merged.push(parameter.clone());
            }
        }
        merged
    }
}
