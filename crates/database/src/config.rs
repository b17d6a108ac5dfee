//! Declarative configuration for tables, live views and the registry.
//!
//! Every type here derives serde with camelCase field names, so a whole
//! session tree can be loaded from JSON:
//!
//! ```json
//! {
//!   "table": "orders",
//!   "permanentFilter": [{"field": "status", "value": "open"}],
//!   "sort": [{"field": "amount", "direction": "desc"}],
//!   "groupBy": ["region"]
//! }
//! ```

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use horizon_core::schema::ColumnDef;
use horizon_core::RowInput;
use horizon_incremental::{Filter, SortSpec};
use horizon_reactive::CoalesceConfig;
use horizon_storage::TableOptions;
use serde::{Deserialize, Serialize};

/// A table declared inline in a session config.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub options: TableOptions,
    /// Loaded when the table is first created.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<RowInput>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
            options: TableOptions::default(),
            rows: Vec::new(),
        }
    }

    pub fn rows(mut self, rows: Vec<RowInput>) -> Self {
        self.rows = rows;
        self
    }
}

/// Data source of a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableRef {
    /// A registered table, a registered session, or a key of the
    /// enclosing `sub_sessions`, looked up in that order: sub-sessions,
    /// tables, sessions.
    Name(String),
    /// A nested session, materialized into a table first.
    Session(Box<SessionConfig>),
    /// A table created on demand.
    Inline(TableSpec),
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        TableRef::Name(name.into())
    }
}

impl From<String> for TableRef {
    fn from(name: String) -> Self {
        TableRef::Name(name)
    }
}

impl From<TableSpec> for TableRef {
    fn from(spec: TableSpec) -> Self {
        TableRef::Inline(spec)
    }
}

impl From<SessionConfig> for TableRef {
    fn from(config: SessionConfig) -> Self {
        TableRef::Session(Box::new(config))
    }
}

/// Declarative definition of a live view.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Registry name. Defaults to a hash of the rest of the config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub table: TableRef,
    /// Output columns, derived from the source row by name. Defaults to the
    /// source table's columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnDef>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<Filter>,
    /// Captured when the view is built. Editing it afterwards only affects
    /// views created from the edited config.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permanent_filter: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub include_leaves: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    /// Named views usable as `table` or as `resolve.session` targets.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sub_sessions: BTreeMap<String, SessionConfig>,
}

impl SessionConfig {
    /// A view over `table` with no filter, sort or grouping.
    pub fn new(table: impl Into<TableRef>) -> Self {
        Self {
            id: None,
            table: table.into(),
            columns: None,
            filter: Vec::new(),
            permanent_filter: Vec::new(),
            sort: Vec::new(),
            group_by: Vec::new(),
            include_leaves: false,
            limit: None,
            offset: None,
            sub_sessions: BTreeMap::new(),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn columns(mut self, columns: Vec<ColumnDef>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn filter(mut self, filter: Vec<Filter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn permanent_filter(mut self, filter: Vec<Filter>) -> Self {
        self.permanent_filter = filter;
        self
    }

    pub fn sort(mut self, sort: Vec<SortSpec>) -> Self {
        self.sort = sort;
        self
    }

    pub fn group_by<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn include_leaves(mut self, include: bool) -> Self {
        self.include_leaves = include;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn sub_session(mut self, name: impl Into<String>, config: SessionConfig) -> Self {
        self.sub_sessions.insert(name.into(), config);
        self
    }

    /// Returns true if the view summarizes its rows by group.
    #[inline]
    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
    }
}

/// One-shot overlay for `get_data`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequest {
    /// Replaces the view's own filter for this read. The permanent filter
    /// still applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Vec<Filter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<SortSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl DataRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Vec<Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort(mut self, sort: Vec<SortSpec>) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn page(mut self, start: usize, limit: usize) -> Self {
        self.start = Some(start);
        self.limit = Some(limit);
        self
    }
}

/// Registry-wide settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Prefix of every table id.
    #[serde(default)]
    pub namespace: String,
    /// Coalesces refreshes of resolve dependents. None refreshes them on
    /// every change of their target.
    #[serde(default = "default_coalesce")]
    pub refresh_coalesce: Option<CoalesceConfig>,
    /// Coalesces changes of grouped views before they reach the table they
    /// are materialized into.
    #[serde(default)]
    pub group_coalesce: CoalesceConfig,
}

fn default_coalesce() -> Option<CoalesceConfig> {
    Some(CoalesceConfig::default())
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            refresh_coalesce: default_coalesce(),
            group_coalesce: CoalesceConfig::default(),
        }
    }
}

impl RegistryConfig {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn refresh_coalesce(mut self, config: Option<CoalesceConfig>) -> Self {
        self.refresh_coalesce = config;
        self
    }

    pub fn group_coalesce(mut self, config: CoalesceConfig) -> Self {
        self.group_coalesce = config;
        self
    }
}
