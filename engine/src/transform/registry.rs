//! Transform Registry - Named catalog of dataset transforms
//!
//! A [`TransformSpec`] is a stateless descriptor: metadata, parameters and an
//! operation function. Binding it to a slot array yields a
//! [`BoundTransform`] that can be called any number of times.
//!
//! ```ignore
//! let registry = Registry::builtin()?;
//! let slots = Slots::new().with(Role::Y, handle(Dataset1D::new(vec![2.0, 4.0])));
//!
//! registry.bind("MulY", slots)?.call(vec![3.0.into()])?;
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::args::{BoundArgs, Call, Param, ParamDefault};
use super::operations::{self, OperationFn};
use crate::error::{RegistryError, RegistryResult, TransformResult};
use crate::models::{Role, Slots};

/// Grouping used when presenting the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Add,
    Sub,
    Multiply,
    Divide,
    Range,
    ExponentialLog,
    Geometry,
    Filtering,
    Normalisation,
    Apply,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Add => "Add",
            Category::Sub => "Sub",
            Category::Multiply => "Multiply",
            Category::Divide => "Divide",
            Category::Range => "Range",
            Category::ExponentialLog => "Exponential / Log",
            Category::Geometry => "Geometry",
            Category::Filtering => "Filtering",
            Category::Normalisation => "Normalisation",
            Category::Apply => "Apply",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Category {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Where a transform writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Role chosen by the `outds` argument.
    Outds,
    /// Role fixed by the variant.
    Fixed(Role),
    /// Works on the slot array as a whole.
    Slots,
}

/// Descriptor of a registered transform.
#[derive(Debug, Clone)]
pub struct TransformSpec {
    pub name: &'static str,
    pub display_name: &'static str,
    pub category: Category,
    pub description: &'static str,
    pub params: Vec<Param>,
    pub target: Target,
    operation: OperationFn,
}

impl TransformSpec {
    pub fn new(
        name: &'static str,
        display_name: &'static str,
        category: Category,
        description: &'static str,
        params: Vec<Param>,
        target: Target,
        operation: OperationFn,
    ) -> Self {
        Self {
            name,
            display_name,
            category,
            description,
            params,
            target,
            operation,
        }
    }

    /// Call signature, e.g. `Clip(outds, minv=-inf, maxv=inf)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(Param::to_string).collect();
        format!("{}({})", self.name, params.join(", "))
    }

    /// Bind to a slot array.
    pub fn bind(&self, slots: Slots) -> BoundTransform<'_> {
        BoundTransform { spec: self, slots }
    }

    pub fn info(&self) -> TransformInfo {
        TransformInfo {
            name: self.name,
            display_name: self.display_name,
            category: self.category,
            description: self.description,
            signature: self.signature(),
        }
    }
}

/// Listing entry returned by [`Registry::list_transforms`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub category: Category,
    pub description: &'static str,
    pub signature: String,
}

/// A transform bound to a slot array, ready to be invoked.
pub struct BoundTransform<'r> {
    spec: &'r TransformSpec,
    slots: Slots,
}

impl<'r> BoundTransform<'r> {
    pub fn spec(&self) -> &'r TransformSpec {
        self.spec
    }

    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    /// Invoke with positional arguments only.
    pub fn call(&self, positional: Vec<super::Arg>) -> TransformResult<()> {
        self.call_with(positional, Vec::new())
    }

    /// Invoke with positional and named arguments.
    pub fn call_with(
        &self,
        positional: Vec<super::Arg>,
        named: Vec<(String, super::Arg)>,
    ) -> TransformResult<()> {
        let args = BoundArgs::bind(&self.spec.params, positional, named)?;
        let fixed = match self.spec.target {
            Target::Fixed(role) => Some(role),
            Target::Outds | Target::Slots => None,
        };
        log::debug!("invoking {} with {:?}", self.spec.name, args);
        (self.spec.operation)(&Call::new(&self.slots, args, fixed))
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Catalog of transforms keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    specs: BTreeMap<&'static str, TransformSpec>,
}

impl Registry {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog of built-in transforms.
    pub fn builtin() -> RegistryResult<Self> {
        let mut registry = Self::new();
        register_builtin(&mut registry)?;
        log::debug!("registered {} built-in transforms", registry.len());
        Ok(registry)
    }

    pub fn register(&mut self, spec: TransformSpec) -> RegistryResult<()> {
        if self.specs.contains_key(spec.name) {
            return Err(RegistryError::Duplicate(spec.name.to_string()));
        }
        self.specs.insert(spec.name, spec);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn get_transform(&self, name: &str) -> RegistryResult<&TransformSpec> {
        log::debug!("looking up transform {name}");
        self.specs
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// All transforms, ordered by name.
    pub fn list_transforms(&self) -> Vec<TransformInfo> {
        self.specs.values().map(TransformSpec::info).collect()
    }

    /// Look up `name` and bind it to `slots`.
    pub fn bind(&self, name: &str, slots: Slots) -> RegistryResult<BoundTransform<'_>> {
        Ok(self.get_transform(name)?.bind(slots))
    }

    /// Markdown table of the catalog, grouped by category.
    pub fn describe(&self) -> String {
        let mut specs: Vec<&TransformSpec> = self.specs.values().collect();
        specs.sort_by_key(|s| (s.category, s.name));

        let mut out = String::from("| Transform | Category | Description |\n|-----------|----------|-------------|\n");
        for spec in specs {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                spec.signature(),
                spec.category,
                spec.description
            ));
        }
        out
    }
}

// =============================================================================
// Built-in catalog
// =============================================================================

/// Name, display name and description of one variant.
type Variant = (&'static str, &'static str, &'static str);

const REQUIRED_VAL: [Param; 1] = [Param::required("val")];

/// Register a generic transform plus its `X` and `Y` variants.
fn register_family(
    registry: &mut Registry,
    category: Category,
    params: &[Param],
    operation: OperationFn,
    variants: [Variant; 3],
) -> RegistryResult<()> {
    register_family_at(registry, category, params, 0, operation, variants)
}

/// Like [`register_family`], with `outds` inserted at `outds_at` in the generic form.
fn register_family_at(
    registry: &mut Registry,
    category: Category,
    params: &[Param],
    outds_at: usize,
    operation: OperationFn,
    [generic, x, y]: [Variant; 3],
) -> RegistryResult<()> {
    let mut with_outds = params.to_vec();
    with_outds.insert(outds_at.min(params.len()), Param::required("outds"));

    let (name, display_name, description) = generic;
    registry.register(TransformSpec::new(
        name,
        display_name,
        category,
        description,
        with_outds,
        Target::Outds,
        operation,
    ))?;

    for ((name, display_name, description), role) in [(x, Role::X), (y, Role::Y)] {
        registry.register(TransformSpec::new(
            name,
            display_name,
            category,
            description,
            params.to_vec(),
            Target::Fixed(role),
            operation,
        ))?;
    }
    Ok(())
}

fn register_builtin(r: &mut Registry) -> RegistryResult<()> {
    use Category::*;

    // Add
    register_family(r, Add, &REQUIRED_VAL, operations::add, [
        ("Add", "Add to dataset", "Add value or dataset [val] to specified output dataset [outds]"),
        ("AddX", "Add to X", "Add value or dataset [val] to X dataset"),
        ("AddY", "Add to Y", "Add value or dataset [val] to Y dataset"),
    ])?;
    register_family(r, Add, &[Param::optional("reverse", ParamDefault::Bool(false))], operations::cumsum, [
        ("CumSum", "Cumulative sum of output dataset",
         "Calculate cumulative sum of [outds] dataset. Sum is from reverse end if [reverse] set"),
        ("CumSumX", "Cumulative sum of X dataset",
         "Calculate cumulative sum of X dataset. Sum is from reverse end if [reverse] set"),
        ("CumSumY", "Cumulative sum of Y dataset",
         "Calculate cumulative sum of Y dataset. Sum is from reverse end if [reverse] set"),
    ])?;

    // Sub
    register_family(r, Sub, &REQUIRED_VAL, operations::sub, [
        ("Sub", "Subtract from dataset", "Subtract value or dataset [val] from specified output dataset [outds]"),
        ("SubX", "Subtract from X", "Subtract value or dataset [val] from X dataset"),
        ("SubY", "Subtract from Y", "Subtract value or dataset [val] from Y dataset"),
    ])?;
    register_family(r, Sub, &[], operations::sub_min, [
        ("SubMin", "Subtract minimum value from dataset", "Subtract minimum value from [outds]"),
        ("SubMinX", "Subtract minimum value from X", "Subtract minimum value from dataset X"),
        ("SubMinY", "Subtract minimum value from Y", "Subtract minimum value from dataset Y"),
    ])?;
    register_family(r, Sub, &[], operations::sub_max, [
        ("SubMax", "Subtract maximum value from dataset", "Subtract maximum value from [outds]"),
        ("SubMaxX", "Subtract maximum value from X", "Subtract maximum value from dataset X"),
        ("SubMaxY", "Subtract maximum value from Y", "Subtract maximum value from dataset Y"),
    ])?;
    register_family(r, Sub, &[], operations::sub_mean, [
        ("SubMean", "Subtract mean value from dataset", "Subtract mean value from [outds]"),
        ("SubMeanX", "Subtract mean value from X", "Subtract mean value from dataset X"),
        ("SubMeanY", "Subtract mean value from Y", "Subtract mean value from dataset Y"),
    ])?;
    register_family(r, Sub, &REQUIRED_VAL, operations::sub_from, [
        ("SubFrom", "Subtract output dataset from value or dataset",
         "Subtract output dataset [outds] from value or dataset [val]"),
        ("SubFromX", "Subtract X dataset from value or dataset", "Subtract X dataset from value or dataset [val]"),
        ("SubFromY", "Subtract Y dataset from value or dataset", "Subtract Y dataset from value or dataset [val]"),
    ])?;

    // Multiply
    register_family(r, Multiply, &REQUIRED_VAL, operations::mul, [
        ("Mul", "Multiply dataset", "Multiply output dataset [outds] by value or dataset [val]"),
        ("MulX", "Multiply X", "Multiply X dataset by value or dataset [val]"),
        ("MulY", "Multiply Y", "Multiply Y dataset by value or dataset [val]"),
    ])?;
    register_family(r, Multiply, &REQUIRED_VAL, operations::pow, [
        ("Pow", "Raise dataset to power", "Raise dataset [outds] to power [val]"),
        ("PowX", "Raise X dataset to power", "Raise X dataset to power [val]"),
        ("PowY", "Raise Y dataset to power", "Raise Y dataset to power [val]"),
    ])?;

    // Divide
    register_family(r, Divide, &REQUIRED_VAL, operations::div, [
        ("Div", "Divide dataset", "Divide output dataset [outds] by value or dataset [val]"),
        ("DivX", "Divide X", "Divide X dataset by value or dataset [val]"),
        ("DivY", "Divide Y", "Divide Y dataset by value or dataset [val]"),
    ])?;
    register_family(r, Divide, &[], operations::div_max, [
        ("DivMax", "Divide dataset by maximum value", "Divide output dataset [outds] by its maximum value"),
        ("DivMaxX", "Divide X by maximum value", "Divide dataset X by its maximum value"),
        ("DivMaxY", "Divide Y by maximum value", "Divide dataset Y by its maximum value"),
    ])?;
    register_family(r, Divide, &[], operations::div_mean, [
        ("DivMean", "Divide dataset by mean value", "Divide output dataset [outds] by its mean value"),
        ("DivMeanX", "Divide X by mean value", "Divide dataset X by its mean value"),
        ("DivMeanY", "Divide Y by mean value", "Divide dataset Y by its mean value"),
    ])?;
    register_family(r, Divide, &[], operations::div_std, [
        ("DivStd", "Divide dataset by standard deviation", "Divide dataset [outds] by its standard deviation"),
        ("DivStdX", "Divide X by standard deviation", "Divide dataset X by its standard deviation"),
        ("DivStdY", "Divide Y by standard deviation", "Divide dataset Y by its standard deviation"),
    ])?;
    register_family(r, Divide, &[], operations::div_sum, [
        ("DivSum", "Divide dataset by sum", "Divide dataset [outds] by its sum"),
        ("DivSumX", "Divide X by sum", "Divide dataset X by its sum"),
        ("DivSumY", "Divide Y by sum", "Divide dataset Y by its sum"),
    ])?;

    // Range
    register_family(r, Range, &[], operations::norm_range, [
        ("NormRange", "Normalise output dataset to be between 0 and 1",
         "Normalise dataset [outds] to be between 0 and 1"),
        ("NormRangeX", "Normalise dataset X to be between 0 and 1", "Normalise dataset X to be between 0 and 1"),
        ("NormRangeY", "Normalise dataset Y to be between 0 and 1", "Normalise dataset Y to be between 0 and 1"),
    ])?;
    register_family(
        r,
        Range,
        &[
            Param::optional("minv", ParamDefault::Number(f64::NEG_INFINITY)),
            Param::optional("maxv", ParamDefault::Number(f64::INFINITY)),
        ],
        operations::clip,
        [
            ("Clip", "Clip dataset", "Clip output dataset [outds] to lie within range [minv to maxv]"),
            ("ClipX", "Clip X dataset", "Clip X dataset values to lie within range [minv to maxv]"),
            ("ClipY", "Clip Y dataset", "Clip Y dataset values to lie within range [minv to maxv]"),
        ],
    )?;

    // Exponential / Log
    register_family(r, ExponentialLog, &[], operations::log10, [
        ("Log10", "Log10 of dataset", "Set output dataset [outds] to be log10 of input"),
        ("Log10X", "Log10 of X", "Set X dataset to be log10 of input X"),
        ("Log10Y", "Log10 of Y", "Set Y dataset to be log10 of input Y"),
    ])?;
    register_family(r, ExponentialLog, &[], operations::log, [
        ("Log", "Natural log of dataset", "Set output dataset [outds] to be natural log of input"),
        ("LogX", "Natural log of X", "Set X dataset to be natural log of input X"),
        ("LogY", "Natural log of Y", "Set Y dataset to be natural log of input Y"),
    ])?;
    register_family(r, ExponentialLog, &[], operations::exp, [
        ("Exp", "Calculate exponential of dataset", "Calculate exponential of output dataset [outds]"),
        ("ExpX", "Calculate exponential of X", "Set X dataset to be e^X"),
        ("ExpY", "Calculate exponential of Y", "Set Y dataset to be e^Y"),
    ])?;
    register_family(r, ExponentialLog, &[], operations::exp10, [
        ("Exp10", "Raise 10 to the power of dataset", "Raise 10 to the power of output dataset [outds]"),
        ("Exp10X", "Raise 10 to the power of X", "Set X dataset to be 10^X"),
        ("Exp10Y", "Raise 10 to the power of Y", "Set Y dataset to be 10^Y"),
    ])?;
    // ExpV takes its value first
    register_family_at(r, ExponentialLog, &REQUIRED_VAL, 1, operations::exp_v, [
        ("ExpV", "Raise value to the power of dataset", "Raise value [val] to the power of output dataset [outds]"),
        ("ExpVX", "Raise value to the power of X dataset", "Raise value [val] to the power of X dataset"),
        ("ExpVY", "Raise value to the power of Y dataset", "Raise value [val] to the power of Y dataset"),
    ])?;

    // Apply
    register_family(r, Apply, &[Param::required("fn")], operations::apply, [
        ("Apply", "Apply function to dataset", "Apply function [fn] to output dataset [outds]"),
        ("ApplyX", "Apply function to X dataset", "Apply function [fn] to X dataset"),
        ("ApplyY", "Apply function to Y dataset", "Apply function [fn] to Y dataset"),
    ])?;

    // Geometry
    r.register(TransformSpec::new(
        "Rotate",
        "Rotate coordinates",
        Geometry,
        "Rotate coordinates by angle in radians [angle_rad], with optional centre [cx,cy]",
        vec![
            Param::required("angle_rad"),
            Param::optional("cx", ParamDefault::Number(0.0)),
            Param::optional("cy", ParamDefault::Number(0.0)),
        ],
        Target::Slots,
        operations::rotate,
    ))?;
    r.register(TransformSpec::new(
        "Translate",
        "Translate coordinates",
        Geometry,
        "Translate coordinates by given shifts [dx,dy]",
        vec![Param::required("dx"), Param::required("dy")],
        Target::Slots,
        operations::translate,
    ))?;

    // Filtering
    r.register(TransformSpec::new(
        "Thin",
        "Thin values",
        Filtering,
        "Thin values by step [step] and optional starting index ([start] from 0)",
        vec![
            Param::required("step"),
            Param::optional("start", ParamDefault::Number(0.0)),
        ],
        Target::Slots,
        operations::thin,
    ))?;
    r.register(TransformSpec::new(
        "IndexRange",
        "Select index range",
        Filtering,
        "Select values between index ranges from start [start], with optional end index [end] \
         and step [step] (Python-style indexing from 0)",
        vec![
            Param::required("start"),
            Param::optional("end", ParamDefault::None),
            Param::optional("step", ParamDefault::None),
        ],
        Target::Slots,
        operations::index_range,
    ))?;

    Ok(())
}
