//! Live views over a table.
//!
//! A `LiveView` keeps a private, filtered copy of its source table's rows
//! and maintains it from the table's events:
//!
//! - a changed row that starts passing the filter is added
//! - a changed row that still passes is updated
//! - a changed row that stops passing is removed from the view
//! - a removed source row is removed from the view if it was a member
//!
//! Filter and sort changes only mark the view dirty. The full refilter and
//! re-sort happen on the next read.
//!
//! With `group_by`, the view's output is one summary row per value of the
//! first group key, and its identity becomes that key. Changes of the member
//! rows are reported as changes of those summary rows.
//!
//! Everything the view emits is collected in an outbox. The owner drains it
//! with `drain_change` after each call and dispatches it.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;
use horizon_core::expr::ExpressionEngine;
use horizon_core::schema::Schema;
use horizon_core::{Error, Result, Row, RowInput, Value};
use horizon_incremental::{group_data, group_selected_data, Filter, FilterChain, Grouping, SortOrder, SortSpec};
use horizon_reactive::{Event, EventBus, UpdateReason, ViewChange};
use horizon_storage::{Derivation, Resolve, Table, TableEvent};
use tracing::{debug, trace, warn};

use crate::config::{DataRequest, SessionConfig};

/// A change notification from a live view.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewEvent {
    DataUpdate(ViewChange),
    Destroy,
}

impl Event for ViewEvent {
    fn name(&self) -> &'static str {
        match self {
            ViewEvent::DataUpdate(_) => "dataUpdate",
            ViewEvent::Destroy => "destroy",
        }
    }
}

/// Output columns derived from source rows.
#[derive(Clone, Debug)]
struct Projection {
    derivation: Derivation,
    /// Source offset feeding each output column.
    offsets: Vec<Option<usize>>,
}

/// Summary rows of a grouped view, keyed by the first group key.
#[derive(Debug)]
struct Groups {
    schema: Schema,
    rows: Vec<Row>,
    by_id: HashMap<Value, usize>,
}

/// An incrementally maintained view of one table.
pub struct LiveView {
    id: String,
    config: SessionConfig,
    engine: Option<Rc<dyn ExpressionEngine>>,
    schema: Schema,
    projection: Option<Projection>,
    keyed_by_source: bool,
    permanent: Vec<Filter>,
    chain: FilterChain,
    order: SortOrder,
    rows: Vec<Row>,
    rows_by_id: HashMap<Value, usize>,
    tombstones: usize,
    groups: Option<Groups>,
    require_filtering: bool,
    require_sorting: bool,
    outbox: ViewChange,
    events: EventBus<ViewEvent>,
}

impl core::fmt::Debug for LiveView {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LiveView")
            .field("id", &self.id)
            .field("rows", &self.rows_by_id.len())
            .field("grouped", &self.groups.is_some())
            .field("require_filtering", &self.require_filtering)
            .field("require_sorting", &self.require_sorting)
            .finish()
    }
}

fn conjunction(permanent: &[Filter], filter: &[Filter]) -> Vec<Filter> {
    permanent.iter().chain(filter).cloned().collect()
}

impl LiveView {
    /// Builds a view of `source` and takes its initial snapshot.
    ///
    /// The permanent filter is captured here and never re-read from the
    /// config.
    pub fn new(
        id: impl Into<String>,
        config: SessionConfig,
        source: &Table,
        engine: Option<Rc<dyn ExpressionEngine>>,
        resolver: &dyn Resolve,
    ) -> Result<Self> {
        let id = id.into();
        let (schema, projection) = Self::layout(&config, source.schema(), engine.as_deref())?;
        let permanent = config.permanent_filter.clone();
        let chain = FilterChain::compile(&conjunction(&permanent, &config.filter), &schema, engine.as_deref())?;
        let order = SortOrder::compile(&config.sort, &schema)?;
        let groups = Self::group_layout(&id, &config, &schema)?.map(|schema| Groups {
            schema,
            rows: Vec::new(),
            by_id: HashMap::new(),
        });

        let mut view = Self {
            keyed_by_source: schema.id_property() == source.schema().id_property(),
            id,
            config,
            engine,
            schema,
            projection,
            permanent,
            chain,
            order,
            rows: Vec::new(),
            rows_by_id: HashMap::new(),
            tombstones: 0,
            groups,
            require_filtering: false,
            require_sorting: false,
            outbox: ViewChange::default(),
            events: EventBus::new(),
        };
        view.rebuild(source, resolver, UpdateReason::Reset);
        view.compact();
        view.outbox = ViewChange::default();

        debug!(view = %view.id, source = %source.id(), rows = view.len(), "live view created");
        Ok(view)
    }

    fn layout(
        config: &SessionConfig,
        source: &Schema,
        engine: Option<&dyn ExpressionEngine>,
    ) -> Result<(Schema, Option<Projection>)> {
        let Some(columns) = &config.columns else {
            return Ok((source.clone(), None));
        };
        let keeps_source_id = !columns.iter().any(|c| c.primary_key)
            && columns.iter().any(|c| c.name == source.id_property());
        let schema = if keeps_source_id {
            Schema::with_id_property(columns.clone(), source.id_property())?
        } else {
            Schema::new(columns.clone())?
        };
        let projection = Projection {
            derivation: Derivation::compile(&schema, engine)?,
            offsets: schema.columns().iter().map(|c| source.offset(&c.name)).collect(),
        };
        Ok((schema, Some(projection)))
    }

    fn group_layout(id: &str, config: &SessionConfig, schema: &Schema) -> Result<Option<Schema>> {
        let Some(first) = config.group_by.first() else {
            return Ok(None);
        };
        for key in &config.group_by {
            if schema.offset(key).is_none() {
                return Err(Error::column_not_found(id, key.as_str()));
            }
        }
        Schema::with_id_property(schema.columns().to_vec(), first).map(Some)
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The stored config. Edits made here are not applied to the view; use
    /// `set_filter` and `set_sort`.
    pub fn config_mut(&mut self) -> &mut SessionConfig {
        &mut self.config
    }

    /// Layout of the member rows.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Layout of the rows this view outputs: the summary layout for grouped
    /// views, the member layout otherwise.
    pub fn output_schema(&self) -> &Schema {
        match &self.groups {
            Some(groups) => &groups.schema,
            None => &self.schema,
        }
    }

    #[inline]
    pub fn is_grouped(&self) -> bool {
        self.groups.is_some()
    }

    /// True when the view computes its own columns instead of copying the
    /// source rows.
    #[inline]
    pub fn derives_columns(&self) -> bool {
        self.projection.is_some()
    }

    #[inline]
    pub fn require_filtering(&self) -> bool {
        self.require_filtering
    }

    #[inline]
    pub fn require_sorting(&self) -> bool {
        self.require_sorting
    }

    /// Number of output rows.
    pub fn len(&self) -> usize {
        match &self.groups {
            Some(groups) => groups.rows.len(),
            None => self.rows_by_id.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn events(&self) -> &EventBus<ViewEvent> {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus<ViewEvent> {
        &mut self.events
    }

    /// Delivers a change to this view's listeners.
    pub fn emit(&mut self, change: &ViewChange) -> usize {
        self.events.trigger(&ViewEvent::DataUpdate(change.clone()))
    }

    /// Returns the output row with the given identity.
    pub fn get_by_id(&self, id: &Value) -> Option<&Row> {
        match &self.groups {
            Some(groups) => groups.by_id.get(id).map(|&slot| &groups.rows[slot]),
            None => self.rows_by_id.get(id).map(|&slot| &self.rows[slot]),
        }
    }

    /// Iterates over the member rows, in no guaranteed order until the next
    /// read.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(|r| !r.is_removed())
    }

    /// Takes the changes accumulated since the last call.
    pub fn drain_change(&mut self) -> Option<ViewChange> {
        if self.outbox.is_empty() {
            self.outbox = ViewChange::default();
            None
        } else {
            Some(core::mem::take(&mut self.outbox))
        }
    }

    /// Replaces the filter. The permanent filter stays in front of it.
    ///
    /// The new filter is validated now and applied on the next read.
    pub fn set_filter(&mut self, filter: Vec<Filter>) -> Result<()> {
        self.chain = FilterChain::compile(
            &conjunction(&self.permanent, &filter),
            &self.schema,
            self.engine.as_deref(),
        )?;
        self.config.filter = filter;
        self.require_filtering = true;
        Ok(())
    }

    /// Replaces the sort, applied on the next read.
    pub fn set_sort(&mut self, sort: Vec<SortSpec>) -> Result<()> {
        self.order = SortOrder::compile(&sort, &self.schema)?;
        self.config.sort = sort;
        self.require_sorting = true;
        Ok(())
    }

    fn row_id(&self, row: &Row) -> Value {
        row.get(self.schema.id_index()).cloned().unwrap_or_default()
    }

    fn live_row(&self, id: &Value) -> Option<&Row> {
        self.rows_by_id.get(id).map(|&slot| &self.rows[slot])
    }

    fn passes(&self, row: &Row) -> bool {
        self.chain.matches(&self.schema.row_ref(row.values()))
    }

    /// Maps a source row into the member layout.
    fn project(&self, row: &Row, resolver: &dyn Resolve) -> Row {
        let Some(projection) = &self.projection else {
            return row.clone();
        };
        let input = RowInput::Positional(
            projection
                .offsets
                .iter()
                .map(|offset| offset.and_then(|o| row.get(o)).cloned().unwrap_or_default())
                .collect(),
        );
        let previous = input.key(&self.schema).and_then(|id| self.live_row(&id));
        let mut projected = projection.derivation.derive(&self.schema, &input, previous, resolver);
        projected.set_seq(row.seq());
        projected
    }

    fn insert(&mut self, id: Value, row: Row) {
        let behind = self.rows.last().is_some_and(|last| last.seq() > row.seq());
        self.rows_by_id.insert(id, self.rows.len());
        self.rows.push(row);
        self.require_sorting |= behind || !self.order.is_empty();
    }

    fn evict(&mut self, id: &Value) -> Option<Row> {
        let slot = self.rows_by_id.remove(id)?;
        let row = self.rows[slot].clone();
        self.rows[slot].mark_removed();
        self.tombstones += 1;
        Some(row)
    }

    fn admit(&mut self, row: Row, delta: &mut ViewChange) {
        let id = self.row_id(&row);
        if id.is_null() {
            return;
        }
        let passes = self.passes(&row);
        match (self.rows_by_id.get(&id).copied(), passes) {
            (None, true) => {
                self.insert(id.clone(), row.clone());
                delta.add(id, row);
            }
            (Some(slot), true) => {
                let moved = self.rows[slot].seq() != row.seq();
                self.rows[slot] = row.clone();
                self.require_sorting |= moved || !self.order.is_empty();
                delta.update(id, row);
            }
            (Some(_), false) => {
                if let Some(old) = self.evict(&id) {
                    delta.remove(id, old);
                }
            }
            (None, false) => {}
        }
    }

    /// Applies one event of the source table.
    pub fn apply(&mut self, event: &TableEvent, source: &Table, resolver: &dyn Resolve) {
        match event {
            TableEvent::Destroy => {}
            TableEvent::DataUpdate {
                reason: UpdateReason::Reset,
                ..
            } => self.rebuild(source, resolver, UpdateReason::Reset),
            TableEvent::DataUpdate {
                reason: UpdateReason::ColumnsChanged,
                ..
            } => {
                if let Err(err) = self.relayout(source.schema()) {
                    warn!(view = %self.id, error = %err, "view no longer fits its source layout");
                }
                self.rebuild(source, resolver, UpdateReason::ColumnsChanged);
            }
            _ if self.require_filtering => self.rebuild(source, resolver, UpdateReason::Filter),
            TableEvent::DataUpdate { rows, reason, .. } => {
                let mut delta = ViewChange::new(*reason);
                for row in rows {
                    let row = self.project(row, resolver);
                    self.admit(row, &mut delta);
                }
                self.publish(delta);
            }
            TableEvent::DataRemove { .. } if !self.keyed_by_source => {
                self.rebuild(source, resolver, UpdateReason::Data)
            }
            TableEvent::DataRemove { ids, .. } => {
                let mut delta = ViewChange::new(UpdateReason::Data);
                for id in ids {
                    if let Some(row) = self.evict(id) {
                        delta.remove(id.clone(), row);
                    }
                }
                self.publish(delta);
            }
        }
    }

    /// Recomputes the view from the whole source and records the difference
    /// to the previous contents.
    pub fn rebuild(&mut self, source: &Table, resolver: &dyn Resolve, reason: UpdateReason) {
        let mut rows = Vec::with_capacity(self.rows_by_id.len());
        let mut by_id: HashMap<Value, usize> = HashMap::new();
        for source_row in source.rows() {
            let row = self.project(source_row, resolver);
            let id = self.row_id(&row);
            if id.is_null() || by_id.contains_key(&id) || !self.passes(&row) {
                continue;
            }
            by_id.insert(id, rows.len());
            rows.push(row);
        }

        let mut delta = ViewChange::new(reason);
        for row in &rows {
            let id = self.row_id(row);
            match self.live_row(&id) {
                None => delta.add(id, row.clone()),
                Some(old) if old.values() != row.values() => delta.update(id, row.clone()),
                Some(_) => {}
            }
        }
        for old in self.rows() {
            let id = self.row_id(old);
            if !by_id.contains_key(&id) {
                delta.remove(id, old.clone());
            }
        }

        trace!(view = %self.id, ?reason, rows = rows.len(), changes = delta.len(), "view rebuilt");
        self.rows = rows;
        self.rows_by_id = by_id;
        self.tombstones = 0;
        self.require_filtering = false;
        self.require_sorting = !self.order.is_empty();
        self.publish(delta);
    }

    fn relayout(&mut self, source: &Schema) -> Result<()> {
        let (schema, projection) = Self::layout(&self.config, source, self.engine.as_deref())?;
        let chain = FilterChain::compile(
            &conjunction(&self.permanent, &self.config.filter),
            &schema,
            self.engine.as_deref(),
        )?;
        let order = SortOrder::compile(&self.config.sort, &schema)?;
        let group_schema = Self::group_layout(&self.id, &self.config, &schema)?;

        if let (Some(groups), Some(group_schema)) = (self.groups.as_mut(), group_schema) {
            groups.schema = group_schema;
        }
        self.keyed_by_source = schema.id_property() == source.id_property();
        self.schema = schema;
        self.projection = projection;
        self.chain = chain;
        self.order = order;
        Ok(())
    }

    fn publish(&mut self, delta: ViewChange) {
        if self.groups.is_some() {
            if !delta.is_empty() || delta.update_reason == UpdateReason::Reset {
                self.regroup(delta.update_reason);
            }
        } else {
            self.outbox.merge(delta);
        }
    }

    fn summaries(&self, members: &[Row]) -> Vec<Row> {
        match group_data(&self.schema, members, &self.config.group_by[..1], false) {
            Ok(grouping) => grouping.groups().iter().map(|g| g.summary.clone()).collect(),
            Err(err) => {
                warn!(view = %self.id, error = %err, "grouping failed");
                Vec::new()
            }
        }
    }

    fn regroup(&mut self, reason: UpdateReason) {
        let members: Vec<Row> = self.rows().cloned().collect();
        let summaries = self.summaries(&members);
        let Some(groups) = self.groups.as_mut() else {
            return;
        };

        let id_index = groups.schema.id_index();
        let group_id = |row: &Row| row.get(id_index).cloned().unwrap_or_default();
        let mut by_id = HashMap::with_capacity(summaries.len());
        let mut delta = ViewChange::new(reason);
        for (slot, summary) in summaries.iter().enumerate() {
            let id = group_id(summary);
            match groups.by_id.get(&id) {
                None => delta.add(id.clone(), summary.clone()),
                Some(&old) if groups.rows[old].values() != summary.values() => {
                    delta.update(id.clone(), summary.clone())
                }
                Some(_) => {}
            }
            by_id.insert(id, slot);
        }
        for old in &groups.rows {
            let id = group_id(old);
            if !by_id.contains_key(&id) {
                delta.remove(id, old.clone());
            }
        }

        groups.rows = summaries;
        groups.by_id = by_id;
        self.outbox.merge(delta);
    }

    fn compact(&mut self) {
        if self.tombstones == 0 && !self.require_sorting {
            return;
        }
        self.rows.retain(|r| !r.is_removed());
        if self.require_sorting {
            let (order, schema) = (&self.order, &self.schema);
            self.rows
                .sort_by(|a, b| order.compare(schema, a, b).then_with(|| a.seq().cmp(&b.seq())));
        }
        let id_index = self.schema.id_index();
        self.rows_by_id = self
            .rows
            .iter()
            .enumerate()
            .map(|(slot, row)| (row.get(id_index).cloned().unwrap_or_default(), slot))
            .collect();
        self.tombstones = 0;
        self.require_sorting = false;
    }

    /// Resolves pending filter and sort changes.
    pub fn sync(&mut self, source: &Table, resolver: &dyn Resolve) {
        if self.require_filtering {
            self.rebuild(source, resolver, UpdateReason::Filter);
        }
        self.compact();
    }

    /// Every output row, sorted, without paging.
    pub fn snapshot(&mut self, source: &Table, resolver: &dyn Resolve) -> Vec<Row> {
        self.sync(source, resolver);
        match &self.groups {
            Some(groups) => {
                let mut rows = groups.rows.clone();
                self.order.sort(&groups.schema, &mut rows);
                rows
            }
            None => self.rows.clone(),
        }
    }

    /// Returns a page of the view, optionally through a one-shot overlay.
    ///
    /// A request filter replaces the view's own filter for this read and is
    /// evaluated against the whole source; the permanent filter always
    /// applies. Paging happens after filtering and sorting, and falls back
    /// to the config's `offset` and `limit`.
    pub fn get_data(&mut self, source: &Table, request: &DataRequest, resolver: &dyn Resolve) -> Result<Vec<Row>> {
        self.sync(source, resolver);

        let overlay = match &request.filter {
            Some(filter) => Some(FilterChain::compile(
                &conjunction(&self.permanent, filter),
                &self.schema,
                self.engine.as_deref(),
            )?),
            None => None,
        };
        let order = match &request.sort {
            Some(sort) => Some(SortOrder::compile(sort, &self.schema)?),
            None => None,
        };

        let mut rows: Vec<Row> = match &overlay {
            Some(chain) => source
                .rows()
                .map(|r| self.project(r, resolver))
                .filter(|r| chain.matches(&self.schema.row_ref(r.values())))
                .collect(),
            None => self.rows.clone(),
        };
        if let Some(groups) = &self.groups {
            rows = if overlay.is_some() {
                self.summaries(&rows)
            } else {
                groups.rows.clone()
            };
        }

        let schema = self.output_schema();
        match &order {
            Some(order) => order.sort(schema, &mut rows),
            None if overlay.is_some() || self.groups.is_some() => self.order.sort(schema, &mut rows),
            None => {}
        }

        let start = request.start.or(self.config.offset).unwrap_or(0);
        let limit = request.limit.or(self.config.limit).unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(start).take(limit).collect())
    }

    /// Groups the current members by the configured keys.
    pub fn group_data(&mut self, source: &Table, resolver: &dyn Resolve) -> Result<Grouping> {
        self.sync(source, resolver);
        group_data(&self.schema, &self.rows, &self.config.group_by, self.config.include_leaves)
    }

    /// Groups the members whose identity is in `selected_ids`.
    pub fn group_selected_data(
        &mut self,
        source: &Table,
        resolver: &dyn Resolve,
        selected_ids: &[Value],
    ) -> Result<Grouping> {
        self.sync(source, resolver);
        group_selected_data(
            &self.schema,
            &self.rows,
            &self.config.group_by,
            self.config.include_leaves,
            selected_ids,
        )
    }

    /// Delivers `Destroy` to the listeners, then detaches them.
    pub fn destroy(&mut self) {
        self.events.trigger(&ViewEvent::Destroy);
        self.events.clear();
        debug!(view = %self.id, "live view destroyed");
    }
}
