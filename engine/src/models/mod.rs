//! Domain models shared by the import engine and the transform registry.
//!
//! - [`Dataset1D`] - Numeric series with optional error bars
//! - [`TextDataset`] - Series of strings produced by import
//! - [`Dataset`] - Either of the above, as held by a document
//! - [`Role`] / [`Slots`] - The fixed 5-slot array transforms operate on
//! - [`DatasetStore`] / [`Document`] - Name-keyed dataset container

use serde::{Deserialize, Serialize};
use std::cell::{RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{TransformError, TransformResult};

// =============================================================================
// Dataset1D
// =============================================================================

/// A numeric series with optional error bars.
///
/// Uncertainty is carried either as a symmetric error (`serr`) or as an
/// asymmetric pair (`perr`, `nerr`). Negative errors are stored as signed
/// offsets, so `nerr` is normally `<= 0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset1D {
    pub data: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serr: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perr: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nerr: Option<Vec<f64>>,
}

impl Dataset1D {
    pub fn new(data: Vec<f64>) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn with_serr(mut self, serr: Vec<f64>) -> Self {
        self.serr = Some(serr);
        self
    }

    pub fn with_perr(mut self, perr: Vec<f64>) -> Self {
        self.perr = Some(perr);
        self
    }

    pub fn with_nerr(mut self, nerr: Vec<f64>) -> Self {
        self.nerr = Some(nerr);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether any error column is populated.
    pub fn has_errors(&self) -> bool {
        self.serr.is_some() || self.perr.is_some() || self.nerr.is_some()
    }

    pub fn clear_errors(&mut self) {
        self.serr = None;
        self.perr = None;
        self.nerr = None;
    }

    /// Truncate data and every populated error column to `len`.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
        for err in self.error_columns_mut() {
            err.truncate(len);
        }
    }

    /// Bring every populated error column to the length of `data`, cutting
    /// long columns and padding short ones with NaN.
    pub fn conform(&mut self) {
        let len = self.data.len();
        for err in self.error_columns_mut() {
            err.resize(len, f64::NAN);
        }
    }

    /// Mutable access to each populated error column.
    pub fn error_columns_mut(&mut self) -> impl Iterator<Item = &mut Vec<f64>> {
        [&mut self.serr, &mut self.perr, &mut self.nerr]
            .into_iter()
            .flatten()
    }

    /// Squared symmetric error per point.
    ///
    /// Uses `serr` directly when present, otherwise `0.5 * (perr² + nerr²)`
    /// with a missing half counting as zero.
    pub fn symmetric_variance(&self) -> Vec<f64> {
        if let Some(serr) = &self.serr {
            return serr.iter().map(|e| e * e).collect();
        }
        (0..self.len())
            .map(|i| {
                let p = self.perr.as_ref().and_then(|v| v.get(i)).copied().unwrap_or(0.0);
                let n = self.nerr.as_ref().and_then(|v| v.get(i)).copied().unwrap_or(0.0);
                0.5 * (p * p + n * n)
            })
            .collect()
    }
}

// =============================================================================
// TextDataset / Dataset
// =============================================================================

/// An ordered series of strings. Carries no error semantics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextDataset {
    pub data: Vec<String>,
}

impl TextDataset {
    pub fn new(data: Vec<String>) -> Self {
        Self { data }
    }
}

/// A dataset as held by a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Dataset {
    Numeric(Dataset1D),
    Text(TextDataset),
}

impl Dataset {
    pub fn as_numeric(&self) -> Option<&Dataset1D> {
        match self {
            Dataset::Numeric(ds) => Some(ds),
            Dataset::Text(_) => None,
        }
    }

    pub fn as_numeric_mut(&mut self) -> Option<&mut Dataset1D> {
        match self {
            Dataset::Numeric(ds) => Some(ds),
            Dataset::Text(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Dataset::Numeric(ds) => ds.len(),
            Dataset::Text(ds) => ds.data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Dataset1D> for Dataset {
    fn from(ds: Dataset1D) -> Self {
        Dataset::Numeric(ds)
    }
}

impl From<TextDataset> for Dataset {
    fn from(ds: TextDataset) -> Self {
        Dataset::Text(ds)
    }
}

/// Shared handle to a dataset owned by a document.
///
/// Mutation through one handle is visible to every other holder.
pub type DatasetHandle = Rc<RefCell<Dataset>>;

/// Wrap a dataset in a fresh handle.
pub fn handle(dataset: impl Into<Dataset>) -> DatasetHandle {
    Rc::new(RefCell::new(dataset.into()))
}

// =============================================================================
// Roles and the slot array
// =============================================================================

/// Semantic role of a slot in the 5-slot dataset array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    X,
    Y,
    Label,
    Size,
    Color,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::X, Role::Y, Role::Label, Role::Size, Role::Color];

    /// Parse a case-insensitive role code (`x`, `y`, `l`/`label`,
    /// `s`/`size`, `c`/`color`).
    pub fn from_code(code: &str) -> TransformResult<Self> {
        match code.to_lowercase().as_str() {
            "x" => Ok(Role::X),
            "y" => Ok(Role::Y),
            "l" | "label" => Ok(Role::Label),
            "s" | "size" => Ok(Role::Size),
            "c" | "color" => Ok(Role::Color),
            _ => Err(TransformError::invalid(format!("Unknown dataset code {code}"))),
        }
    }

    /// Index of this role in the slot array.
    pub fn index(self) -> usize {
        match self {
            Role::X => 0,
            Role::Y => 1,
            Role::Label => 2,
            Role::Size => 3,
            Role::Color => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::X => "x",
            Role::Y => "y",
            Role::Label => "label",
            Role::Size => "size",
            Role::Color => "color",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slot index for a role code.
pub fn ds_code_to_idx(code: &str) -> TransformResult<usize> {
    Role::from_code(code).map(Role::index)
}

/// Exactly five optional dataset handles addressed by [`Role`].
#[derive(Debug, Clone, Default)]
pub struct Slots([Option<DatasetHandle>; 5]);

impl Slots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style slot assignment.
    pub fn with(mut self, role: Role, dataset: DatasetHandle) -> Self {
        self.set(role, Some(dataset));
        self
    }

    pub fn set(&mut self, role: Role, dataset: Option<DatasetHandle>) {
        self.0[role.index()] = dataset;
    }

    pub fn get(&self, role: Role) -> Option<&DatasetHandle> {
        self.0[role.index()].as_ref()
    }

    /// Non-empty slots in role order.
    pub fn iter(&self) -> impl Iterator<Item = (Role, &DatasetHandle)> {
        Role::ALL
            .into_iter()
            .filter_map(move |role| self.get(role).map(|h| (role, h)))
    }

    /// Mutable access to the numeric dataset bound to `role`.
    ///
    /// The borrow must be released before another slot is borrowed, since two
    /// slots may share one handle.
    pub fn numeric_mut(&self, role: Role) -> TransformResult<RefMut<'_, Dataset1D>> {
        let handle = self.get(role).ok_or(TransformError::EmptySlot(role))?;
        let guard = handle
            .try_borrow_mut()
            .map_err(|_| TransformError::invalid(format!("dataset in the {role} slot is in use")))?;
        RefMut::filter_map(guard, Dataset::as_numeric_mut).map_err(|_| TransformError::NotNumeric(role))
    }

    /// Copy of the numeric dataset bound to `role`.
    pub fn numeric(&self, role: Role) -> TransformResult<Dataset1D> {
        self.numeric_mut(role).map(|ds| ds.clone())
    }
}

// =============================================================================
// Dataset store
// =============================================================================

/// Name-keyed dataset container the import engine commits into.
pub trait DatasetStore {
    fn get_data(&self, name: &str) -> Option<DatasetHandle>;
    fn set_data(&mut self, name: &str, dataset: Dataset);
}

/// In-memory document holding datasets by name.
#[derive(Debug, Default)]
pub struct Document {
    datasets: BTreeMap<String, DatasetHandle>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dataset names in lexicographic order.
    pub fn names(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DatasetHandle)> {
        self.datasets.iter()
    }
}

impl DatasetStore for Document {
    fn get_data(&self, name: &str) -> Option<DatasetHandle> {
        self.datasets.get(name).cloned()
    }

    /// Replacing an existing name rewrites the dataset behind its handle, so
    /// holders of the old handle observe the new contents. If that handle is
    /// currently borrowed the name is bound to a fresh handle instead.
    fn set_data(&mut self, name: &str, dataset: Dataset) {
        if let Some(existing) = self.datasets.get(name) {
            if let Ok(mut current) = existing.try_borrow_mut() {
                *current = dataset;
                return;
            }
            log::warn!("dataset '{}' is borrowed, binding the name to a new handle", name);
        }
        self.datasets.insert(name.to_string(), handle(dataset));
    }
}
