//! Arguments accepted by transforms and their binding to parameters.
//!
//! Transforms are invoked Python-style: positional values first, then named
//! values, with per-parameter defaults filling the rest. Binding resolves all
//! of that once, so an operation only ever reads typed values by name.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{TransformError, TransformResult};
use crate::models::{Dataset, Dataset1D, DatasetHandle, Role, Slots};

/// An already-parsed function of one value, used by `Apply` transforms.
pub type ScalarFn = Rc<dyn Fn(f64) -> f64>;

// =============================================================================
// Argument values
// =============================================================================

/// A value passed to a transform.
#[derive(Clone)]
pub enum Arg {
    None,
    Bool(bool),
    Number(f64),
    Array(Vec<f64>),
    Text(String),
    Dataset(DatasetHandle),
    Function(ScalarFn),
}

impl Arg {
    pub fn function(f: impl Fn(f64) -> f64 + 'static) -> Self {
        Arg::Function(Rc::new(f))
    }

    fn kind(&self) -> &'static str {
        match self {
            Arg::None => "none",
            Arg::Bool(_) => "bool",
            Arg::Number(_) => "number",
            Arg::Array(_) => "array",
            Arg::Text(_) => "text",
            Arg::Dataset(_) => "dataset",
            Arg::Function(_) => "function",
        }
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::None => f.write_str("None"),
            Arg::Bool(b) => write!(f, "Bool({b})"),
            Arg::Number(v) => write!(f, "Number({v})"),
            Arg::Array(v) => write!(f, "Array({v:?})"),
            Arg::Text(s) => write!(f, "Text({s:?})"),
            Arg::Dataset(h) => match h.try_borrow() {
                Ok(ds) => write!(f, "Dataset(len={})", ds.len()),
                Err(_) => f.write_str("Dataset(..)"),
            },
            Arg::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Number(v)
    }
}

impl From<i32> for Arg {
    fn from(v: i32) -> Self {
        Arg::Number(f64::from(v))
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Text(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Text(v)
    }
}

impl From<Vec<f64>> for Arg {
    fn from(v: Vec<f64>) -> Self {
        Arg::Array(v)
    }
}

impl From<DatasetHandle> for Arg {
    fn from(v: DatasetHandle) -> Self {
        Arg::Dataset(v)
    }
}

impl From<&DatasetHandle> for Arg {
    fn from(v: &DatasetHandle) -> Self {
        Arg::Dataset(Rc::clone(v))
    }
}

/// Second operand of an arithmetic transform.
#[derive(Debug, Clone)]
pub enum Operand {
    /// Applied to every point.
    Scalar(f64),
    /// Applied point by point.
    Array(Vec<f64>),
    /// Combined point by point, with error propagation.
    Dataset(Dataset1D),
}

// =============================================================================
// Parameters
// =============================================================================

/// Default value of a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    Required,
    None,
    Bool(bool),
    Number(f64),
}

/// A named transform parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param {
    pub name: &'static str,
    pub default: ParamDefault,
}

impl Param {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            default: ParamDefault::Required,
        }
    }

    pub const fn optional(name: &'static str, default: ParamDefault) -> Self {
        Self { name, default }
    }

    fn default_arg(&self) -> Option<Arg> {
        match self.default {
            ParamDefault::Required => None,
            ParamDefault::None => Some(Arg::None),
            ParamDefault::Bool(b) => Some(Arg::Bool(b)),
            ParamDefault::Number(v) => Some(Arg::Number(v)),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.default {
            ParamDefault::Required => write!(f, "{}", self.name),
            ParamDefault::None => write!(f, "{}=None", self.name),
            ParamDefault::Bool(b) => write!(f, "{}={}", self.name, b),
            ParamDefault::Number(v) => write!(f, "{}={}", self.name, v),
        }
    }
}

// =============================================================================
// Binding
// =============================================================================

/// Arguments resolved against a parameter list.
#[derive(Debug, Clone, Default)]
pub struct BoundArgs {
    values: HashMap<&'static str, Arg>,
}

impl BoundArgs {
    /// Match positional then named arguments to `params`, filling defaults.
    pub fn bind(params: &[Param], positional: Vec<Arg>, named: Vec<(String, Arg)>) -> TransformResult<Self> {
        if positional.len() > params.len() {
            return Err(TransformError::invalid(format!(
                "takes at most {} arguments ({} given)",
                params.len(),
                positional.len()
            )));
        }

        let mut values: HashMap<&'static str, Arg> = params
            .iter()
            .zip(positional)
            .map(|(p, arg)| (p.name, arg))
            .collect();

        for (name, arg) in named {
            let param = params
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(|| TransformError::invalid(format!("unexpected argument '{name}'")))?;
            if values.insert(param.name, arg).is_some() {
                return Err(TransformError::invalid(format!(
                    "multiple values for argument '{name}'"
                )));
            }
        }

        for param in params {
            if values.contains_key(param.name) {
                continue;
            }
            let default = param
                .default_arg()
                .ok_or_else(|| TransformError::invalid(format!("missing argument '{}'", param.name)))?;
            values.insert(param.name, default);
        }

        Ok(Self { values })
    }

    fn get(&self, name: &str) -> TransformResult<&Arg> {
        self.values
            .get(name)
            .ok_or_else(|| TransformError::invalid(format!("missing argument '{name}'")))
    }

    fn wrong_kind(name: &str, expected: &str, got: &Arg) -> TransformError {
        TransformError::invalid(format!("'{name}' must be {expected}, got {}", got.kind()))
    }

    /// A role code such as `outds`.
    pub fn role(&self, name: &str) -> TransformResult<Role> {
        match self.get(name)? {
            Arg::Text(code) => Role::from_code(code),
            other => Err(TransformError::invalid(format!(
                "Unknown dataset code {other:?}"
            ))),
        }
    }

    pub fn number(&self, name: &str) -> TransformResult<f64> {
        match self.get(name)? {
            Arg::Number(v) => Ok(*v),
            other => Err(Self::wrong_kind(name, "a number", other)),
        }
    }

    pub fn flag(&self, name: &str) -> TransformResult<bool> {
        match self.get(name)? {
            Arg::Bool(b) => Ok(*b),
            Arg::Number(v) => Ok(*v != 0.0),
            Arg::None => Ok(false),
            other => Err(Self::wrong_kind(name, "a bool", other)),
        }
    }

    /// An integer index; `None` maps to `Ok(None)`.
    pub fn optional_index(&self, name: &str) -> TransformResult<Option<isize>> {
        match self.get(name)? {
            Arg::None => Ok(None),
            Arg::Number(v) if v.fract() == 0.0 && v.is_finite() => Ok(Some(*v as isize)),
            other => Err(Self::wrong_kind(name, "an integer", other)),
        }
    }

    pub fn index(&self, name: &str) -> TransformResult<isize> {
        self.optional_index(name)?
            .ok_or_else(|| TransformError::invalid(format!("'{name}' must be an integer, got none")))
    }

    /// A scalar, array or numeric dataset.
    ///
    /// Datasets are copied so the target may alias the operand.
    pub fn operand(&self, name: &str) -> TransformResult<Operand> {
        match self.get(name)? {
            Arg::Number(v) => Ok(Operand::Scalar(*v)),
            Arg::Array(v) => Ok(Operand::Array(v.clone())),
            Arg::Dataset(h) => {
                let guard = h
                    .try_borrow()
                    .map_err(|_| TransformError::invalid(format!("dataset '{name}' is in use")))?;
                match &*guard {
                    Dataset::Numeric(ds) => {
                        let mut ds = ds.clone();
                        ds.conform();
                        Ok(Operand::Dataset(ds))
                    }
                    Dataset::Text(_) => Err(TransformError::invalid(format!(
                        "'{name}' must be a numeric dataset, got text"
                    ))),
                }
            }
            other => Err(Self::wrong_kind(name, "a value or dataset", other)),
        }
    }

    pub fn function(&self, name: &str) -> TransformResult<ScalarFn> {
        match self.get(name)? {
            Arg::Function(f) => Ok(Rc::clone(f)),
            other => Err(Self::wrong_kind(name, "a function", other)),
        }
    }
}

// =============================================================================
// Call context
// =============================================================================

/// Everything an operation sees during one invocation.
pub struct Call<'a> {
    pub slots: &'a Slots,
    pub args: BoundArgs,
    fixed: Option<Role>,
}

impl<'a> Call<'a> {
    pub fn new(slots: &'a Slots, args: BoundArgs, fixed: Option<Role>) -> Self {
        Self { slots, args, fixed }
    }

    /// The role the transform writes to: fixed by an `X`/`Y` variant, or
    /// read from the `outds` argument.
    pub fn target(&self) -> TransformResult<Role> {
        match self.fixed {
            Some(role) => Ok(role),
            None => self.args.role("outds"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{handle, TextDataset};

    const CLIP_PARAMS: [Param; 3] = [
        Param::required("outds"),
        Param::optional("minv", ParamDefault::Number(f64::NEG_INFINITY)),
        Param::optional("maxv", ParamDefault::Number(f64::INFINITY)),
    ];

    #[test]
    fn test_bind_positional_named_and_defaults() {
        let args = BoundArgs::bind(&CLIP_PARAMS, vec!["y".into()], vec![("maxv".into(), 10.0.into())]).unwrap();
        assert_eq!(args.role("outds").unwrap(), Role::Y);
        assert_eq!(args.number("minv").unwrap(), f64::NEG_INFINITY);
        assert_eq!(args.number("maxv").unwrap(), 10.0);
    }

    #[test]
    fn test_bind_rejects_bad_calls() {
        let too_many = BoundArgs::bind(&CLIP_PARAMS, vec!["y".into(), 1.0.into(), 2.0.into(), 3.0.into()], vec![]);
        assert!(matches!(too_many, Err(TransformError::InvalidArgument(_))));

        let unknown = BoundArgs::bind(&CLIP_PARAMS, vec!["y".into()], vec![("lo".into(), 1.0.into())]);
        assert!(matches!(unknown, Err(TransformError::InvalidArgument(_))));

        let duplicate = BoundArgs::bind(&CLIP_PARAMS, vec!["y".into()], vec![("outds".into(), "x".into())]);
        assert!(matches!(duplicate, Err(TransformError::InvalidArgument(_))));

        let missing = BoundArgs::bind(&CLIP_PARAMS, vec![], vec![]);
        assert!(matches!(missing, Err(TransformError::InvalidArgument(_))));
    }

    #[test]
    fn test_operand_kinds() {
        let params = [Param::required("val")];
        let ds = handle(Dataset1D::new(vec![1.0, 2.0]).with_serr(vec![0.1]));

        let args = BoundArgs::bind(&params, vec![(&ds).into()], vec![]).unwrap();
        match args.operand("val").unwrap() {
            Operand::Dataset(d) => assert_eq!(d.serr.unwrap().len(), 2),
            other => panic!("unexpected operand {other:?}"),
        }

        let args = BoundArgs::bind(&params, vec![2.5.into()], vec![]).unwrap();
        assert!(matches!(args.operand("val").unwrap(), Operand::Scalar(v) if v == 2.5));

        let text = handle(TextDataset::new(vec!["a".into()]));
        let args = BoundArgs::bind(&params, vec![text.into()], vec![]).unwrap();
        assert!(args.operand("val").is_err());
    }

    #[test]
    fn test_index_arguments() {
        let params = [Param::required("start"), Param::optional("end", ParamDefault::None)];
        let args = BoundArgs::bind(&params, vec![2.into()], vec![]).unwrap();
        assert_eq!(args.index("start").unwrap(), 2);
        assert_eq!(args.optional_index("end").unwrap(), None);

        let args = BoundArgs::bind(&params, vec![1.5.into()], vec![]).unwrap();
        assert!(args.index("start").is_err());
    }

    #[test]
    fn test_param_display() {
        let shown: Vec<String> = CLIP_PARAMS.iter().map(Param::to_string).collect();
        assert_eq!(shown, vec!["outds", "minv=-inf", "maxv=inf"]);
    }
}
