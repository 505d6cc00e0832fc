//! Operation parameters: constants, control-rate values and signal references
//!
//! Every operation input is bound to a [`Parameter`]:
//! - Constant values: `Parameter::Constant(0.5)`
//! - Control-rate values: re-read only on the owning node's control ticks
//! - Signal references: the current output of another operation
//!
//! The set of kinds is closed, so dispatch is a `match` on the tag.

use crate::operation::OperationId;

/// Update rate an input is declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rate {
    /// Read every sample
    Audio,
    /// Read on the owning node's control ticks and held in between
    Control,
}

/// Declared input of an operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSpec {
    pub name: &'static str,
    pub rate: Rate,
    /// Value used when the input is left unbound; `None` means the input is required
    pub default: Option<f32>,
}

impl InputSpec {
    pub const fn audio(name: &'static str) -> Self {
        Self {
            name,
            rate: Rate::Audio,
            default: None,
        }
    }

    pub const fn control(name: &'static str, default: f32) -> Self {
        Self {
            name,
            rate: Rate::Control,
            default: Some(default),
        }
    }
}

/// Control-rate value with its refresh cadence in ticks
///
/// A `period` of 0 means "use the engine's configured control period".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlValue {
    pub value: f32,
    pub period: u32,
}

impl ControlValue {
    pub fn new(value: f32) -> Self {
        Self { value, period: 0 }
    }

    pub fn with_period(value: f32, period: u32) -> Self {
        Self { value, period }
    }
}

/// A parameter bound to an operation input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Parameter {
    /// A constant numeric value
    Constant(f32),

    /// A control-rate value
    Control(ControlValue),

    /// Non-owning reference to another operation's output
    AudioRateRef(OperationId),
}

impl Parameter {
    pub fn constant(value: f32) -> Self {
        Parameter::Constant(value)
    }

    pub fn control(value: f32) -> Self {
        Parameter::Control(ControlValue::new(value))
    }

    pub fn reference(id: OperationId) -> Self {
        Parameter::AudioRateRef(id)
    }

    /// Referenced operation, if this parameter is a signal reference
    pub fn source(&self) -> Option<OperationId> {
        match self {
            Parameter::AudioRateRef(id) => Some(*id),
            _ => None,
        }
    }

    /// Scalar value for constants and control values
    pub fn scalar(&self) -> Option<f32> {
        match self {
            Parameter::Constant(v) => Some(*v),
            Parameter::Control(c) => Some(c.value),
            Parameter::AudioRateRef(_) => None,
        }
    }

    /// Requested control cadence (0 = engine default)
    pub fn control_period(&self) -> u32 {
        match self {
            Parameter::Control(c) => c.period,
            _ => 0,
        }
    }

    /// Check if this parameter varies over time
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Parameter::AudioRateRef(_))
    }
}

/// Helper to create parameters from various input types
pub trait IntoParameter {
    fn into_parameter(self) -> Parameter;
}

impl IntoParameter for Parameter {
    fn into_parameter(self) -> Parameter {
        self
    }
}

/// Bare numbers bind as control-rate values at the engine's default cadence
impl IntoParameter for f32 {
    fn into_parameter(self) -> Parameter {
        Parameter::control(self)
    }
}

impl IntoParameter for f64 {
    fn into_parameter(self) -> Parameter {
        Parameter::control(self as f32)
    }
}

impl IntoParameter for ControlValue {
    fn into_parameter(self) -> Parameter {
        Parameter::Control(self)
    }
}

impl IntoParameter for OperationId {
    fn into_parameter(self) -> Parameter {
        Parameter::AudioRateRef(self)
    }
}

/// Named parameter assignments for [`crate::SignalGraph::add_operation`]
///
/// # Example
/// ```ignore
/// let bindings = Bindings::new()
///     .bind("input", osc)
///     .bind("center_frequency", 1000.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    entries: Vec<(String, Parameter)>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`; a later binding of the same name replaces the earlier one
    pub fn bind(mut self, name: &str, parameter: impl IntoParameter) -> Self {
        let parameter = parameter.into_parameter();
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = parameter,
            None => self.entries.push((name.to_string(), parameter)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Parameter> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| *p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Parameter)> {
        self.entries.iter().map(|(n, p)| (n.as_str(), *p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_parameter() {
        let param = Parameter::constant(440.0);
        assert_eq!(param.scalar(), Some(440.0));
        assert_eq!(param.source(), None);
        assert!(!param.is_dynamic());
    }

    #[test]
    fn test_reference_parameter() {
        let param = Parameter::reference(OperationId(3));
        assert_eq!(param.source(), Some(OperationId(3)));
        assert_eq!(param.scalar(), None);
        assert!(param.is_dynamic());
    }

    #[test]
    fn test_into_parameter() {
        let p1 = 440.0f32.into_parameter();
        assert!(matches!(p1, Parameter::Control(ControlValue { value, period: 0 }) if value == 440.0));

        let p2 = OperationId(7).into_parameter();
        assert_eq!(p2, Parameter::AudioRateRef(OperationId(7)));

        let p3 = ControlValue::with_period(2.0, 16).into_parameter();
        assert_eq!(p3.control_period(), 16);
    }

    #[test]
    fn test_bindings_replace_by_name() {
        let bindings = Bindings::new()
            .bind("bandwidth", 100.0)
            .bind("bandwidth", 200.0)
            .bind("input", OperationId(0));

        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings.get("bandwidth"), Some(Parameter::control(200.0)));
        assert_eq!(bindings.get("missing"), None);
    }
}
