//! Error-propagation kernels.
//!
//! Every kernel mutates its target in place and expects error columns that
//! already match the data length (see [`Dataset1D::conform`]). Binary kernels
//! cut the target to the shorter of the two operands.
//!
//! | Case               | `+` / `-`        | `×`                        | `÷`                           |
//! |--------------------|------------------|----------------------------|-------------------------------|
//! | neither has errors | untouched        | untouched                  | untouched                     |
//! | only `d2`          | copy `d2` errors | `d2` errors × abs(d1)      | `d2` errors × abs(ratio / d2) |
//! | only `d1`          | keep             | × abs(d2)                  | ÷ abs(d2)                     |
//! | both               | √(s1² + s2²)     | √(f1² + f2²) × abs(d1·d2)  | √(f1² + f2²) × abs(ratio)     |
//!
//! `s` is the symmetric error, `f = s / data` the fractional error. When both
//! sides have errors the result carries `serr` only.

use crate::error::{TransformError, TransformResult};
use crate::models::Dataset1D;

fn head(column: &Option<Vec<f64>>, len: usize) -> Option<Vec<f64>> {
    column.as_ref().map(|e| e.iter().take(len).copied().collect())
}

fn scaled(column: &Option<Vec<f64>>, factors: &[f64]) -> Option<Vec<f64>> {
    column
        .as_ref()
        .map(|e| e.iter().zip(factors).map(|(e, f)| e * f).collect())
}

/// Squared fractional error per point.
fn fractional_variance(ds: &Dataset1D) -> Vec<f64> {
    ds.symmetric_variance()
        .into_iter()
        .zip(&ds.data)
        .map(|(var, d)| var / (d * d))
        .collect()
}

/// `√(f1² + f2²)·|result|` over the first `result.len()` points.
fn fractional_quadrature(d1: &Dataset1D, d2: &Dataset1D, result: &[f64]) -> Vec<f64> {
    fractional_variance(d1)
        .into_iter()
        .zip(fractional_variance(d2))
        .zip(result)
        .map(|((f1, f2), r)| (f1 + f2).sqrt() * r.abs())
        .collect()
}

// =============================================================================
// Dataset operands
// =============================================================================

/// `d1 ± d2` with linear error combination.
pub fn add_sub_dataset(d1: &mut Dataset1D, d2: &Dataset1D, sub: bool) {
    let minlen = d1.len().min(d2.len());
    d1.truncate(minlen);

    for (a, b) in d1.data.iter_mut().zip(&d2.data) {
        if sub {
            *a -= b;
        } else {
            *a += b;
        }
    }

    match (d1.has_errors(), d2.has_errors()) {
        (false, true) => {
            d1.serr = head(&d2.serr, minlen);
            d1.perr = head(&d2.perr, minlen);
            d1.nerr = head(&d2.nerr, minlen);
        }
        (true, true) => {
            let combined = d1
                .symmetric_variance()
                .into_iter()
                .zip(d2.symmetric_variance())
                .map(|(v1, v2)| (v1 + v2).sqrt())
                .collect();
            d1.serr = Some(combined);
            d1.perr = None;
            d1.nerr = None;
        }
        _ => {}
    }
}

/// `d1 × d2` with fractional error combination.
pub fn multiply_dataset(d1: &mut Dataset1D, d2: &Dataset1D) {
    let minlen = d1.len().min(d2.len());
    d1.truncate(minlen);

    let product: Vec<f64> = d1.data.iter().zip(&d2.data).map(|(a, b)| a * b).collect();

    match (d1.has_errors(), d2.has_errors()) {
        (false, true) => {
            let scale: Vec<f64> = d1.data.iter().map(|d| d.abs()).collect();
            d1.serr = scaled(&d2.serr, &scale);
            d1.perr = scaled(&d2.perr, &scale);
            d1.nerr = scaled(&d2.nerr, &scale);
        }
        (true, false) => {
            let scale: Vec<f64> = d2.data.iter().take(minlen).map(|d| d.abs()).collect();
            for column in d1.error_columns_mut() {
                for (e, s) in column.iter_mut().zip(&scale) {
                    *e *= s;
                }
            }
        }
        (true, true) => {
            d1.serr = Some(fractional_quadrature(d1, d2, &product));
            d1.perr = None;
            d1.nerr = None;
        }
        (false, false) => {}
    }

    d1.data = product;
}

/// `d1 ÷ d2` with fractional error combination.
pub fn divide_dataset(d1: &mut Dataset1D, d2: &Dataset1D) {
    let minlen = d1.len().min(d2.len());
    d1.truncate(minlen);

    let ratio: Vec<f64> = d1.data.iter().zip(&d2.data).map(|(a, b)| a / b).collect();

    match (d1.has_errors(), d2.has_errors()) {
        (false, true) => {
            let scale: Vec<f64> = ratio
                .iter()
                .zip(&d2.data)
                .map(|(r, d)| (r / d).abs())
                .collect();
            d1.serr = scaled(&d2.serr, &scale);
            d1.perr = scaled(&d2.perr, &scale);
            d1.nerr = scaled(&d2.nerr, &scale);
        }
        (true, false) => {
            let scale: Vec<f64> = d2.data.iter().take(minlen).map(|d| 1.0 / d.abs()).collect();
            for column in d1.error_columns_mut() {
                for (e, s) in column.iter_mut().zip(&scale) {
                    *e *= s;
                }
            }
        }
        (true, true) => {
            d1.serr = Some(fractional_quadrature(d1, d2, &ratio));
            d1.perr = None;
            d1.nerr = None;
        }
        (false, false) => {}
    }

    d1.data = ratio;
}

// =============================================================================
// Scalar and array operands
// =============================================================================

/// Pair each point with a right-hand value.
///
/// A single value applies to every point; otherwise the dataset is cut to the
/// shorter of the two lengths.
pub fn broadcast(ds: &mut Dataset1D, values: &[f64]) -> Vec<f64> {
    match values {
        [v] => vec![*v; ds.len()],
        _ => {
            let n = ds.len().min(values.len());
            ds.truncate(n);
            values[..n].to_vec()
        }
    }
}

/// Shift data by `rhs`, errors untouched.
pub fn offset(ds: &mut Dataset1D, rhs: &[f64], sign: f64) {
    for (d, r) in ds.data.iter_mut().zip(rhs) {
        *d += sign * r;
    }
}

/// Multiply data and every error column by `rhs`.
pub fn scale(ds: &mut Dataset1D, rhs: &[f64]) {
    for (d, r) in ds.data.iter_mut().zip(rhs) {
        *d *= r;
    }
    for column in ds.error_columns_mut() {
        for (e, r) in column.iter_mut().zip(rhs) {
            *e *= r;
        }
    }
}

/// Replace data by `rhs - data`, errors untouched.
pub fn subtract_from(ds: &mut Dataset1D, rhs: &[f64]) {
    for (d, r) in ds.data.iter_mut().zip(rhs) {
        *d = r - *d;
    }
}

// =============================================================================
// Function application
// =============================================================================

/// Apply `f` to data and recompute errors at the error extremes.
///
/// The upper extreme is `data + serr`, replaced by `data + perr` when `perr`
/// is present; the lower extreme is `data - serr`, replaced by `data + nerr`.
/// New `perr`/`nerr` are `f(extreme) - f(data)`; `serr` is cleared.
pub fn apply_at_extremes(ds: &mut Dataset1D, f: impl Fn(f64) -> f64) {
    let shifted = |column: &Vec<f64>, sign: f64| -> Vec<f64> {
        ds.data.iter().zip(column).map(|(d, e)| d + sign * e).collect()
    };

    let mut upper = ds.serr.as_ref().map(|e| shifted(e, 1.0));
    let mut lower = ds.serr.as_ref().map(|e| shifted(e, -1.0));
    if let Some(nerr) = &ds.nerr {
        lower = Some(shifted(nerr, 1.0));
    }
    if let Some(perr) = &ds.perr {
        upper = Some(shifted(perr, 1.0));
    }

    ds.data = ds.data.iter().map(|d| f(*d)).collect();

    let deltas = |extreme: Vec<f64>| -> Vec<f64> {
        extreme.into_iter().zip(&ds.data).map(|(x, d)| f(x) - d).collect()
    };
    if let Some(upper) = upper {
        ds.perr = Some(deltas(upper));
    }
    if let Some(lower) = lower {
        ds.nerr = Some(deltas(lower));
    }
    ds.serr = None;
}

/// Clamp into `[minv, maxv]`, leaving NaN as NaN.
pub fn clip_value(v: f64, minv: f64, maxv: f64) -> f64 {
    if v.is_nan() {
        v
    } else {
        v.max(minv).min(maxv)
    }
}

// =============================================================================
// Accumulation and reductions
// =============================================================================

fn running_sum(values: impl DoubleEndedIterator<Item = f64>, reverse: bool) -> Vec<f64> {
    let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
    let mut total = 0.0;
    let mut acc = |v: f64| {
        total += finite(v);
        total
    };
    if reverse {
        let mut out: Vec<f64> = values.rev().map(&mut acc).collect();
        out.reverse();
        out
    } else {
        values.map(acc).collect()
    }
}

/// Cumulative sum with non-finite values counted as zero.
///
/// Errors accumulate in quadrature; `nerr` keeps its negative sign.
pub fn cumsum(ds: &mut Dataset1D, reverse: bool) {
    ds.data = running_sum(ds.data.iter().copied(), reverse);

    let quadrature = |column: &Vec<f64>, sign: f64| -> Vec<f64> {
        running_sum(column.iter().map(|e| e * e), reverse)
            .into_iter()
            .map(|v| sign * v.sqrt())
            .collect()
    };
    ds.serr = ds.serr.as_ref().map(|e| quadrature(e, 1.0));
    ds.perr = ds.perr.as_ref().map(|e| quadrature(e, 1.0));
    ds.nerr = ds.nerr.as_ref().map(|e| quadrature(e, -1.0));
}

/// The finite values of `data`.
pub fn finite_values(data: &[f64]) -> Vec<f64> {
    data.iter().copied().filter(|v| v.is_finite()).collect()
}

pub fn minimum(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

pub fn maximum(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

pub fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

pub fn mean(values: &[f64]) -> f64 {
    sum(values) / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

// =============================================================================
// Slicing
// =============================================================================

/// Indices selected by a `start:stop:step` slice over `len` items.
///
/// Bounds follow sequence-slice rules: negative values count from the end,
/// out-of-range values are clamped and omitted ones default according to the
/// sign of `step`.
pub fn slice_indices(
    len: usize,
    start: Option<isize>,
    stop: Option<isize>,
    step: Option<isize>,
) -> TransformResult<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(TransformError::invalid("slice step cannot be zero"));
    }

    let len = len as isize;
    let backwards = step < 0;
    let adjust = |bound: isize| -> isize {
        if bound < 0 {
            let bound = bound + len;
            if bound < 0 {
                if backwards {
                    -1
                } else {
                    0
                }
            } else {
                bound
            }
        } else if bound >= len {
            if backwards {
                len - 1
            } else {
                len
            }
        } else {
            bound
        }
    };

    let start = match start {
        Some(s) => adjust(s),
        None if backwards => len - 1,
        None => 0,
    };
    let stop = match stop {
        Some(s) => adjust(s),
        None if backwards => -1,
        None => len,
    };

    let mut indices = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        indices.push(i as usize);
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(indices)
}

/// Keep the items at `indices`, in that order.
pub fn select<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().filter_map(|&i| values.get(i).cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{actual:?} vs {expected:?}");
        }
    }

    #[test]
    fn test_add_both_errors_in_quadrature() {
        let mut d1 = Dataset1D::new(vec![1.0, 2.0, 3.0]).with_serr(vec![0.1; 3]);
        let d2 = Dataset1D::new(vec![4.0, 5.0, 6.0]).with_serr(vec![0.2; 3]);
        add_sub_dataset(&mut d1, &d2, false);
        assert_close(&d1.data, &[5.0, 7.0, 9.0]);
        assert_close(d1.serr.as_ref().unwrap(), &[0.05f64.sqrt(); 3]);
    }

    #[test]
    fn test_add_asymmetric_symmetrised() {
        let mut d1 = Dataset1D::new(vec![1.0])
            .with_perr(vec![0.3])
            .with_nerr(vec![-0.1]);
        let d2 = Dataset1D::new(vec![1.0]).with_serr(vec![0.2]);
        add_sub_dataset(&mut d1, &d2, true);
        assert_close(&d1.data, &[0.0]);
        assert_close(d1.serr.as_ref().unwrap(), &[(0.05f64 + 0.04).sqrt()]);
        assert!(d1.perr.is_none() && d1.nerr.is_none());
    }

    #[test]
    fn test_add_copies_operand_errors() {
        let mut d1 = Dataset1D::new(vec![1.0, 2.0, 3.0]);
        let d2 = Dataset1D::new(vec![1.0, 1.0])
            .with_perr(vec![0.5, 0.6])
            .with_nerr(vec![-0.1, -0.2]);
        add_sub_dataset(&mut d1, &d2, false);
        assert_close(&d1.data, &[2.0, 3.0]);
        assert_eq!(d1.perr, Some(vec![0.5, 0.6]));
        assert_eq!(d1.nerr, Some(vec![-0.1, -0.2]));
        assert!(d1.serr.is_none());
    }

    #[test]
    fn test_add_keeps_target_errors_truncated() {
        let mut d1 = Dataset1D::new(vec![1.0, 2.0, 3.0]).with_serr(vec![0.1, 0.2, 0.3]);
        add_sub_dataset(&mut d1, &Dataset1D::new(vec![1.0, 1.0]), false);
        assert_eq!(d1.serr, Some(vec![0.1, 0.2]));
    }

    #[test]
    fn test_multiply_error_cases() {
        // only the operand has errors
        let mut d1 = Dataset1D::new(vec![-2.0, 3.0]);
        multiply_dataset(&mut d1, &Dataset1D::new(vec![4.0, 5.0]).with_serr(vec![0.5, 1.0]));
        assert_close(&d1.data, &[-8.0, 15.0]);
        assert_close(d1.serr.as_ref().unwrap(), &[1.0, 3.0]);

        // only the target has errors
        let mut d1 = Dataset1D::new(vec![2.0, 3.0]).with_perr(vec![0.1, 0.2]);
        multiply_dataset(&mut d1, &Dataset1D::new(vec![-10.0, 10.0, 7.0]));
        assert_close(&d1.data, &[-20.0, 30.0]);
        assert_close(d1.perr.as_ref().unwrap(), &[1.0, 2.0]);

        // both
        let mut d1 = Dataset1D::new(vec![10.0]).with_serr(vec![1.0]);
        multiply_dataset(&mut d1, &Dataset1D::new(vec![2.0]).with_serr(vec![0.2]));
        assert_close(&d1.data, &[20.0]);
        assert_close(d1.serr.as_ref().unwrap(), &[0.02f64.sqrt() * 20.0]);
    }

    #[test]
    fn test_divide_both_errors() {
        let mut d1 = Dataset1D::new(vec![10.0]).with_serr(vec![1.0]);
        divide_dataset(&mut d1, &Dataset1D::new(vec![2.0]).with_serr(vec![0.2]));
        assert_close(&d1.data, &[5.0]);
        assert_close(d1.serr.as_ref().unwrap(), &[(0.1f64 * 0.1 + 0.1 * 0.1).sqrt() * 5.0]);
    }

    #[test]
    fn test_divide_single_sided_errors() {
        let mut d1 = Dataset1D::new(vec![10.0, 9.0]);
        divide_dataset(&mut d1, &Dataset1D::new(vec![2.0, 3.0]).with_nerr(vec![-0.2, -0.3]));
        assert_close(&d1.data, &[5.0, 3.0]);
        assert_close(d1.nerr.as_ref().unwrap(), &[-0.5, -0.3]);

        let mut d1 = Dataset1D::new(vec![10.0]).with_serr(vec![1.0]);
        divide_dataset(&mut d1, &Dataset1D::new(vec![-4.0]));
        assert_close(&d1.data, &[-2.5]);
        assert_close(d1.serr.as_ref().unwrap(), &[0.25]);
    }

    #[test]
    fn test_broadcast_single_and_array() {
        let mut ds = Dataset1D::new(vec![1.0, 2.0, 3.0]).with_serr(vec![0.1; 3]);
        assert_eq!(broadcast(&mut ds, &[2.0]), vec![2.0; 3]);
        assert_eq!(ds.len(), 3);

        assert_eq!(broadcast(&mut ds, &[1.0, 2.0]), vec![1.0, 2.0]);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.serr.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_apply_at_extremes_symmetric() {
        let mut ds = Dataset1D::new(vec![100.0]).with_serr(vec![10.0]);
        apply_at_extremes(&mut ds, f64::log10);
        assert_close(&ds.data, &[2.0]);
        assert_close(ds.perr.as_ref().unwrap(), &[110f64.log10() - 2.0]);
        assert_close(ds.nerr.as_ref().unwrap(), &[90f64.log10() - 2.0]);
        assert!(ds.serr.is_none());
    }

    #[test]
    fn test_apply_at_extremes_one_sided() {
        let mut ds = Dataset1D::new(vec![1.0, 2.0]).with_nerr(vec![-1.0, -1.0]);
        apply_at_extremes(&mut ds, |v| v * v);
        assert_close(&ds.data, &[1.0, 4.0]);
        assert_close(ds.nerr.as_ref().unwrap(), &[-1.0, -3.0]);
        assert!(ds.perr.is_none());
    }

    #[test]
    fn test_cumsum_forward_and_reverse() {
        let mut ds = Dataset1D::new(vec![1.0, f64::NAN, 2.0, 3.0]).with_nerr(vec![-3.0, -4.0, 0.0, 0.0]);
        cumsum(&mut ds, false);
        assert_close(&ds.data, &[1.0, 1.0, 3.0, 6.0]);
        assert_close(ds.nerr.as_ref().unwrap(), &[-3.0, -5.0, -5.0, -5.0]);

        let mut ds = Dataset1D::new(vec![1.0, 2.0, 3.0]);
        cumsum(&mut ds, true);
        assert_close(&ds.data, &[6.0, 5.0, 3.0]);
    }

    #[test]
    fn test_cumsum_symmetric_and_positive_errors() {
        let mut ds = Dataset1D::new(vec![1.0, 1.0]).with_serr(vec![3.0, 4.0]);
        cumsum(&mut ds, false);
        assert_close(&ds.data, &[1.0, 2.0]);
        assert_close(ds.serr.as_ref().unwrap(), &[3.0, 5.0]);

        let mut ds = Dataset1D::new(vec![1.0, 1.0, 1.0]).with_perr(vec![4.0, f64::NAN, 3.0]);
        cumsum(&mut ds, true);
        assert_close(&ds.data, &[3.0, 2.0, 1.0]);
        assert_close(ds.perr.as_ref().unwrap(), &[5.0, 3.0, 3.0]);
    }

    #[test]
    fn test_statistics() {
        let values = finite_values(&[2.0, f64::NAN, 4.0, f64::INFINITY, 6.0]);
        assert_eq!(values, vec![2.0, 4.0, 6.0]);
        assert_eq!(minimum(&values), 2.0);
        assert_eq!(maximum(&values), 6.0);
        assert_eq!(sum(&values), 12.0);
        assert_eq!(mean(&values), 4.0);
        assert!((std_dev(&values) - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_clip_value_keeps_nan() {
        assert_eq!(clip_value(-5.0, 0.0, 10.0), 0.0);
        assert_eq!(clip_value(15.0, 0.0, 10.0), 10.0);
        assert!(clip_value(f64::NAN, 0.0, 10.0).is_nan());
    }

    #[test]
    fn test_slice_indices_like_sequence_slices() {
        let s = |start, stop, step| slice_indices(5, start, stop, step).unwrap();
        assert_eq!(s(None, None, None), vec![0, 1, 2, 3, 4]);
        assert_eq!(s(Some(1), None, Some(2)), vec![1, 3]);
        assert_eq!(s(Some(-2), None, None), vec![3, 4]);
        assert_eq!(s(Some(1), Some(-1), None), vec![1, 2, 3]);
        assert_eq!(s(None, None, Some(-1)), vec![4, 3, 2, 1, 0]);
        assert_eq!(s(Some(3), Some(0), Some(-2)), vec![3, 1]);
        assert_eq!(s(Some(10), None, None), Vec::<usize>::new());
        assert_eq!(s(Some(-10), Some(2), None), vec![0, 1]);
        assert_eq!(s(Some(10), Some(-10), Some(-1)), vec![4, 3, 2, 1, 0]);
        assert_eq!(s(Some(0), None, Some(-1)), vec![0]);
    }

    #[test]
    fn test_slice_huge_step_stops_after_first() {
        assert_eq!(slice_indices(4, Some(1), None, Some(isize::MAX)).unwrap(), vec![1]);
        assert_eq!(slice_indices(4, Some(-2), None, Some(isize::MIN)).unwrap(), vec![2]);
    }

    #[test]
    fn test_slice_zero_step_rejected() {
        assert!(matches!(
            slice_indices(3, None, None, Some(0)),
            Err(TransformError::InvalidArgument(_))
        ));
    }
}
