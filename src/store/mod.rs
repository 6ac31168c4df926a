//! Store contract: table ownership, column metadata, lifecycle, registry

mod registry;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::events::{EventEmitter, ListenerHandle};
use crate::model::{CellValue, Table};
use crate::parser::export_columns_with;

pub use self::registry::{
    add_store, get_all_store_names, get_all_stores, get_store, store_from_json,
    store_from_json_str, StoreFactory,
};

/// Events emitted over a store's load lifecycle.
///
/// Exactly one terminal event fires per load invocation: `AfterLoad` with a
/// fully-constructed table, or `LoadError` with an error description.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    AfterLoad { table: Table },
    LoadError { error: String },
}

/// Descriptive metadata for one column, merged field-wise
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaColumn {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

impl MetaColumn {
    pub fn with_index(index: usize) -> Self {
        Self {
            index: Some(index),
            ..Default::default()
        }
    }

    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Merge the other record's present fields into this one
    pub fn merge(&mut self, other: &MetaColumn) {
        if other.index.is_some() {
            self.index = other.index;
        }
        if other.title.is_some() {
            self.title = other.title.clone();
        }
        if other.data_type.is_some() {
            self.data_type = other.data_type.clone();
        }
    }
}

/// Serialized store wire shape, reconstructible through the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreJson {
    pub class_tag: String,
    #[serde(default)]
    pub metadata: IndexMap<String, MetaColumn>,
    pub table: Table,
}

/// Shared store behavior: one owned table, column metadata, event fan-out.
///
/// Concrete stores hold a `StoreCore` and implement [`Store`] over it; there
/// is no inheritance chain.
#[derive(Debug)]
pub struct StoreCore {
    table: Table,
    metadata: IndexMap<String, MetaColumn>,
    emitter: EventEmitter<StoreEvent>,
}

impl Default for StoreCore {
    fn default() -> Self {
        Self::new(Table::new())
    }
}

impl StoreCore {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            metadata: IndexMap::new(),
            emitter: EventEmitter::new(),
        }
    }

    pub fn with_metadata(table: Table, metadata: IndexMap<String, MetaColumn>) -> Self {
        Self {
            table,
            metadata,
            emitter: EventEmitter::new(),
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut Table {
        &mut self.table
    }

    pub fn metadata(&self) -> &IndexMap<String, MetaColumn> {
        &self.metadata
    }

    /// Merge metadata fields for one column
    pub fn describe_column(&mut self, name: impl Into<String>, meta: MetaColumn) {
        self.metadata.entry(name.into()).or_default().merge(&meta);
    }

    /// Merge metadata for several columns
    pub fn describe_columns<I>(&mut self, metas: I)
    where
        I: IntoIterator<Item = (String, MetaColumn)>,
    {
        for (name, meta) in metas {
            self.describe_column(name, meta);
        }
    }

    /// Column names ordered by stored `index` metadata; columns without an
    /// index keep their discovery position.
    pub fn column_order(&self) -> Vec<String> {
        let mut entries: Vec<(usize, usize, &String)> = self
            .metadata
            .iter()
            .enumerate()
            .map(|(position, (name, meta))| (meta.index.unwrap_or(position), position, name))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        entries.into_iter().map(|(_, _, name)| name.clone()).collect()
    }

    /// Assign sequential column indices matching the given order
    pub fn set_column_order<I>(&mut self, names: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for (index, name) in names.into_iter().enumerate() {
            let name: String = name.into();
            self.describe_column(name, MetaColumn::with_index(index));
        }
    }

    /// Table columns filtered and sorted per the stored column order.
    ///
    /// Semantics match the parser's ordered column export, sourced from the
    /// store's own metadata rather than the table's presentation state.
    pub fn columns_for_export(&self, include_id: bool) -> (Vec<String>, Vec<Vec<CellValue>>) {
        let order = self.column_order();
        let positions: IndexMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(position, name)| (name.as_str(), position))
            .collect();
        export_columns_with(&self.table, include_id, |a, b| {
            match (positions.get(a), positions.get(b)) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.cmp(b),
            }
        })
    }

    /// Register a store-event listener
    pub fn on(&mut self, listener: Box<dyn Fn(&StoreEvent) + Send + Sync>) -> ListenerHandle {
        self.emitter.on(listener)
    }

    /// Remove a previously registered listener
    pub fn off(&mut self, handle: ListenerHandle) -> bool {
        self.emitter.off(handle)
    }

    pub fn emit(&self, event: &StoreEvent) {
        self.emitter.emit(event);
    }

    /// Serialized form under the given class tag
    pub fn to_json(&self, class_tag: &str) -> StoreJson {
        StoreJson {
            class_tag: class_tag.to_string(),
            metadata: self.metadata.clone(),
            table: self.table.clone(),
        }
    }
}

/// Contract every store type satisfies.
///
/// The base `load` emits `AfterLoad` with the current table immediately;
/// stores performing real acquisition override it and must emit exactly one
/// terminal event per invocation, only after their table is fully built.
pub trait Store {
    fn core(&self) -> &StoreCore;

    fn core_mut(&mut self) -> &mut StoreCore;

    /// Registered name of this store type; becomes the JSON class tag
    fn class_tag(&self) -> &'static str;

    fn load(&mut self) {
        tracing::debug!(
            store = self.class_tag(),
            rows = self.core().table().row_count(),
            "store load"
        );
        let event = StoreEvent::AfterLoad {
            table: self.core().table().clone(),
        };
        self.core().emit(&event);
    }

    fn to_json(&self) -> StoreJson {
        self.core().to_json(self.class_tag())
    }
}

/// Minimal concrete store wrapping an in-memory table.
///
/// Acquisition stores live outside this crate; this variant exists so the
/// registry and the class-tag round trip have a constructible type.
#[derive(Debug, Default)]
pub struct MemoryStore {
    core: StoreCore,
}

impl MemoryStore {
    pub const NAME: &'static str = "MemoryStore";

    pub fn new(table: Table) -> Self {
        Self {
            core: StoreCore::new(table),
        }
    }

    pub fn from_json(json: &StoreJson) -> Result<Self, StoreError> {
        Ok(Self {
            core: StoreCore::with_metadata(json.table.clone(), json.metadata.clone()),
        })
    }

    /// Register this type in the process-wide registry; `false` when a
    /// store is already registered under the name.
    pub fn register() -> bool {
        fn build(json: &StoreJson) -> Result<Box<dyn Store>, StoreError> {
            Ok(Box::new(MemoryStore::from_json(json)?))
        }
        add_store(Self::NAME, build)
    }
}

impl Store for MemoryStore {
    fn core(&self) -> &StoreCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StoreCore {
        &mut self.core
    }

    fn class_tag(&self) -> &'static str {
        Self::NAME
    }
}
