//! Operation functions behind every registered transform.
//!
//! Each function reads its bound arguments from a [`Call`] and mutates the
//! datasets in the slot array. `X`/`Y` variants share the function of their
//! generic form and only differ in how [`Call::target`] resolves.

use std::cell::RefMut;
use std::rc::Rc;

use super::args::{Call, Operand};
use super::propagate;
use crate::error::{TransformError, TransformResult};
use crate::geometry;
use crate::models::{Dataset, Dataset1D, DatasetHandle, Role};

pub type OperationFn = fn(&Call<'_>) -> TransformResult<()>;

/// The target dataset, with error columns brought to the data length.
fn target<'a>(call: &'a Call<'_>) -> TransformResult<RefMut<'a, Dataset1D>> {
    let role = call.target()?;
    let mut ds = call.slots.numeric_mut(role)?;
    ds.conform();
    Ok(ds)
}

fn operand_values(operand: &Operand) -> Option<&[f64]> {
    match operand {
        Operand::Scalar(v) => Some(std::slice::from_ref(v)),
        Operand::Array(v) => Some(v),
        Operand::Dataset(_) => None,
    }
}

// =============================================================================
// Additive
// =============================================================================

fn add_or_sub(call: &Call<'_>, sub: bool) -> TransformResult<()> {
    let operand = call.args.operand("val")?;
    let mut ds = target(call)?;
    match &operand {
        Operand::Dataset(other) => propagate::add_sub_dataset(&mut ds, other, sub),
        _ => {
            let values = operand_values(&operand).unwrap_or_default();
            let rhs = propagate::broadcast(&mut ds, values);
            propagate::offset(&mut ds, &rhs, if sub { -1.0 } else { 1.0 });
        }
    }
    Ok(())
}

pub fn add(call: &Call<'_>) -> TransformResult<()> {
    add_or_sub(call, false)
}

pub fn sub(call: &Call<'_>) -> TransformResult<()> {
    add_or_sub(call, true)
}

/// `val - outds`, written into the target.
pub fn sub_from(call: &Call<'_>) -> TransformResult<()> {
    let operand = call.args.operand("val")?;
    let mut ds = target(call)?;
    match operand {
        Operand::Dataset(mut result) => {
            propagate::add_sub_dataset(&mut result, &ds, true);
            *ds = result;
        }
        other => {
            let values = operand_values(&other).unwrap_or_default();
            let rhs = propagate::broadcast(&mut ds, values);
            propagate::subtract_from(&mut ds, &rhs);
        }
    }
    Ok(())
}

pub fn cumsum(call: &Call<'_>) -> TransformResult<()> {
    let reverse = call.args.flag("reverse")?;
    let mut ds = target(call)?;
    propagate::cumsum(&mut ds, reverse);
    Ok(())
}

// =============================================================================
// Multiplicative
// =============================================================================

pub fn mul(call: &Call<'_>) -> TransformResult<()> {
    let operand = call.args.operand("val")?;
    let mut ds = target(call)?;
    match &operand {
        Operand::Dataset(other) => propagate::multiply_dataset(&mut ds, other),
        _ => {
            let values = operand_values(&operand).unwrap_or_default();
            let rhs = propagate::broadcast(&mut ds, values);
            propagate::scale(&mut ds, &rhs);
        }
    }
    Ok(())
}

pub fn div(call: &Call<'_>) -> TransformResult<()> {
    let operand = call.args.operand("val")?;
    let mut ds = target(call)?;
    match &operand {
        Operand::Dataset(other) => propagate::divide_dataset(&mut ds, other),
        _ => {
            let values = operand_values(&operand).unwrap_or_default();
            let rhs: Vec<f64> = propagate::broadcast(&mut ds, values)
                .into_iter()
                .map(|v| 1.0 / v)
                .collect();
            propagate::scale(&mut ds, &rhs);
        }
    }
    Ok(())
}

pub fn pow(call: &Call<'_>) -> TransformResult<()> {
    let exponent = call.args.number("val")?;
    let mut ds = target(call)?;
    propagate::apply_at_extremes(&mut ds, |v| v.powf(exponent));
    Ok(())
}

// =============================================================================
// Function application
// =============================================================================

fn apply_fn(call: &Call<'_>, f: impl Fn(f64) -> f64) -> TransformResult<()> {
    let mut ds = target(call)?;
    propagate::apply_at_extremes(&mut ds, f);
    Ok(())
}

pub fn log10(call: &Call<'_>) -> TransformResult<()> {
    apply_fn(call, f64::log10)
}

pub fn log(call: &Call<'_>) -> TransformResult<()> {
    apply_fn(call, f64::ln)
}

pub fn exp(call: &Call<'_>) -> TransformResult<()> {
    apply_fn(call, f64::exp)
}

pub fn exp10(call: &Call<'_>) -> TransformResult<()> {
    apply_fn(call, |v| 10f64.powf(v))
}

pub fn exp_v(call: &Call<'_>) -> TransformResult<()> {
    let base = call.args.number("val")?;
    apply_fn(call, |v| base.powf(v))
}

pub fn apply(call: &Call<'_>) -> TransformResult<()> {
    let f = call.args.function("fn")?;
    apply_fn(call, |v| f(v))
}

pub fn clip(call: &Call<'_>) -> TransformResult<()> {
    let minv = call.args.number("minv")?;
    let maxv = call.args.number("maxv")?;
    apply_fn(call, |v| propagate::clip_value(v, minv, maxv))
}

// =============================================================================
// Reductions
// =============================================================================

/// Compute `stat` over the finite values of the target, then apply
/// `f(value, stat)`. Does nothing when no value is finite.
fn reduce(
    call: &Call<'_>,
    label: &str,
    stat: fn(&[f64]) -> f64,
    f: fn(f64, f64) -> f64,
) -> TransformResult<()> {
    let mut ds = target(call)?;
    let finite = propagate::finite_values(&ds.data);
    if finite.is_empty() {
        log::warn!("{label}: no finite values in the {} dataset, left unchanged", call.target()?);
        return Ok(());
    }
    let s = stat(&finite);
    propagate::apply_at_extremes(&mut ds, |v| f(v, s));
    Ok(())
}

fn minus(v: f64, s: f64) -> f64 {
    v - s
}

fn over(v: f64, s: f64) -> f64 {
    v / s
}

pub fn sub_min(call: &Call<'_>) -> TransformResult<()> {
    reduce(call, "SubMin", propagate::minimum, minus)
}

pub fn sub_max(call: &Call<'_>) -> TransformResult<()> {
    reduce(call, "SubMax", propagate::maximum, minus)
}

pub fn sub_mean(call: &Call<'_>) -> TransformResult<()> {
    reduce(call, "SubMean", propagate::mean, minus)
}

pub fn div_max(call: &Call<'_>) -> TransformResult<()> {
    reduce(call, "DivMax", propagate::maximum, over)
}

pub fn div_mean(call: &Call<'_>) -> TransformResult<()> {
    reduce(call, "DivMean", propagate::mean, over)
}

pub fn div_std(call: &Call<'_>) -> TransformResult<()> {
    reduce(call, "DivStd", propagate::std_dev, over)
}

pub fn div_sum(call: &Call<'_>) -> TransformResult<()> {
    reduce(call, "DivSum", propagate::sum, over)
}

/// Map the finite range onto `[0, 1]`.
pub fn norm_range(call: &Call<'_>) -> TransformResult<()> {
    let mut ds = target(call)?;
    let finite = propagate::finite_values(&ds.data);
    if finite.is_empty() {
        log::warn!("NormRange: no finite values in the {} dataset, left unchanged", call.target()?);
        return Ok(());
    }
    let minv = propagate::minimum(&finite);
    let scale = 1.0 / (propagate::maximum(&finite) - minv);
    propagate::apply_at_extremes(&mut ds, |v| (v - minv) * scale);
    Ok(())
}

// =============================================================================
// Geometry
// =============================================================================

pub fn rotate(call: &Call<'_>) -> TransformResult<()> {
    let angle = call.args.number("angle_rad")?;
    let cx = call.args.number("cx")?;
    let cy = call.args.number("cy")?;

    let xs = call.slots.numeric(Role::X)?.data;
    let ys = call.slots.numeric(Role::Y)?.data;
    let m = geometry::planar_rotation(angle, cx, cy);
    let (nx, ny): (Vec<f64>, Vec<f64>) = xs
        .iter()
        .zip(&ys)
        .map(|(&x, &y)| geometry::apply_planar(&m, x, y))
        .unzip();

    for (role, data) in [(Role::X, nx), (Role::Y, ny)] {
        let mut ds = call.slots.numeric_mut(role)?;
        ds.data = data;
        ds.clear_errors();
    }
    Ok(())
}

pub fn translate(call: &Call<'_>) -> TransformResult<()> {
    let dx = call.args.number("dx")?;
    let dy = call.args.number("dy")?;
    let m = geometry::translation_matrix([dx, dy, 0.0]);

    {
        let mut xs = call.slots.numeric_mut(Role::X)?;
        for x in xs.data.iter_mut() {
            *x = geometry::apply_planar(&m, *x, 0.0).0;
        }
    }
    let mut ys = call.slots.numeric_mut(Role::Y)?;
    for y in ys.data.iter_mut() {
        *y = geometry::apply_planar(&m, 0.0, *y).1;
    }
    Ok(())
}

// =============================================================================
// Filtering
// =============================================================================

/// Slice every distinct non-empty slot, data and error columns alike.
fn slice_all(
    call: &Call<'_>,
    start: Option<isize>,
    stop: Option<isize>,
    step: Option<isize>,
) -> TransformResult<()> {
    let mut seen: Vec<&DatasetHandle> = Vec::new();
    for (role, handle) in call.slots.iter() {
        if seen.iter().any(|h| Rc::ptr_eq(*h, handle)) {
            continue;
        }
        seen.push(handle);

        let mut guard = handle
            .try_borrow_mut()
            .map_err(|_| TransformError::invalid(format!("dataset in the {role} slot is in use")))?;
        let indices = propagate::slice_indices(guard.len(), start, stop, step)?;
        match &mut *guard {
            Dataset::Numeric(ds) => {
                ds.conform();
                ds.data = propagate::select(&ds.data, &indices);
                for column in ds.error_columns_mut() {
                    *column = propagate::select(&column[..], &indices);
                }
            }
            Dataset::Text(ds) => ds.data = propagate::select(&ds.data, &indices),
        }
    }
    Ok(())
}

pub fn thin(call: &Call<'_>) -> TransformResult<()> {
    let step = call.args.index("step")?;
    let start = call.args.index("start")?;
    slice_all(call, Some(start), None, Some(step))
}

pub fn index_range(call: &Call<'_>) -> TransformResult<()> {
    let start = call.args.index("start")?;
    let end = call.args.optional_index("end")?;
    let step = call.args.optional_index("step")?;
    slice_all(call, Some(start), end, step)
}
