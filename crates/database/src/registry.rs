//! Registry - the catalogue of tables and live views.
//!
//! The registry owns every table and view in two arenas addressed by
//! handles, and wires them together:
//!
//! - a view receives the events of its source table
//! - a table materialized from a view receives the view's changes as
//!   mutations
//! - a table or view with resolve columns is refreshed when its target
//!   changes
//!
//! Mutations never dispatch recursively. Every event is queued and the
//! queue is drained in order, so dependents see changes in the order the
//! mutations were made, and within one mutation in the order the views were
//! registered.
//!
//! Coalesced work (table batches, refreshes of resolve dependents, changes
//! of grouped views) waits in `UpdateCoalescer`s until the host calls
//! `run_pending` or `flush`.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use ahash::RandomState;
use hashbrown::HashMap;
use horizon_core::expr::ExpressionEngine;
use horizon_core::schema::{ColumnDef, ResolveSpec, Schema};
use horizon_core::text::render_template;
use horizon_core::{Error, Result, Row, RowInput, RowRef, Value};
use horizon_incremental::{Filter, Grouping, SortSpec};
use horizon_reactive::{Clock, ListenerId, UpdateCoalescer, UpdateReason, ViewChange};
use horizon_storage::{Origin, Resolve, Table, TableBatch, TableEvent, TableOptions};
use tracing::{debug, trace, warn};

use crate::config::{DataRequest, RegistryConfig, SessionConfig, TableRef};
use crate::graph::{DependencyGraph, EdgeKind, Node};
use crate::live_view::{LiveView, ViewEvent};

/// Handle of a registered table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TableId(usize);

/// Handle of a registered live view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(usize);

/// A data mutation addressed to a table.
#[derive(Clone, Debug)]
pub enum Mutation {
    Add(Vec<RowInput>),
    Update(Vec<RowInput>),
    Remove(Vec<Value>),
    /// Replaces the contents, or compacts with None.
    Reset(Option<Vec<RowInput>>),
}

struct TableEntry {
    table: Table,
    coalescer: Option<UpdateCoalescer<TableBatch>>,
    /// Views reading this table, in registration order.
    views: Vec<SessionId>,
    /// View this table is materialized from.
    mirror_of: Option<SessionId>,
}

struct SessionEntry {
    view: LiveView,
    source: TableId,
    mirror: Option<TableId>,
    mirror_coalescer: Option<UpdateCoalescer<ViewChange>>,
}

enum Dispatch {
    Table(TableId, TableEvent),
    Session(SessionId, ViewChange),
    Refresh(Node),
}

/// Catalogue of tables and live views.
pub struct Registry {
    config: RegistryConfig,
    clock: Rc<dyn Clock>,
    engine: Option<Rc<dyn ExpressionEngine>>,
    hasher: RandomState,
    tables: Vec<Option<TableEntry>>,
    table_names: HashMap<String, TableId>,
    sessions: Vec<Option<SessionEntry>>,
    session_names: HashMap<String, SessionId>,
    graph: DependencyGraph,
    refreshes: BTreeMap<Node, UpdateCoalescer<()>>,
    queue: VecDeque<Dispatch>,
    dispatching: bool,
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("namespace", &self.config.namespace)
            .field("tables", &self.table_names.len())
            .field("sessions", &self.session_names.len())
            .field("edges", &self.graph.edge_count())
            .finish()
    }
}

/// Output columns of a view as plain stored columns of a mirror table.
fn mirror_columns(schema: &Schema) -> Vec<ColumnDef> {
    let id_property = schema.id_property();
    schema
        .columns()
        .iter()
        .map(|c| ColumnDef {
            name: c.name.clone(),
            primary_key: c.name == id_property,
            secondary_key: c.secondary_key,
            column_type: c.column_type,
            aggregator: c.aggregator.clone(),
            ..ColumnDef::default()
        })
        .collect()
}

fn resolve_target(spec: &ResolveSpec) -> Option<Node> {
    match (&spec.session, &spec.children_table) {
        (Some(session), _) => Some(Node::session(session.as_str())),
        (None, Some(table)) => Some(Node::table(table.as_str())),
        (None, None) => None,
    }
}

fn display(spec: &ResolveSpec, schema: &Schema, row: &Row) -> Value {
    let child = schema.row_ref(row.values());
    match &spec.display_template {
        Some(template) => Value::String(render_template(template, &child)),
        None => child.get(&spec.display_field).clone(),
    }
}

impl Registry {
    /// Creates an empty registry driven by `clock`.
    pub fn new(config: RegistryConfig, clock: Rc<dyn Clock>) -> Self {
        debug!(namespace = %config.namespace, "registry created");
        Self {
            config,
            clock,
            engine: None,
            hasher: RandomState::with_seeds(
                0x243f_6a88_85a3_08d3,
                0x1319_8a2e_0370_7344,
                0xa409_3822_299f_31d0,
                0x082e_fa98_ec4e_6c89,
            ),
            tables: Vec::new(),
            table_names: HashMap::new(),
            sessions: Vec::new(),
            session_names: HashMap::new(),
            graph: DependencyGraph::new(),
            refreshes: BTreeMap::new(),
            queue: VecDeque::new(),
            dispatching: false,
        }
    }

    /// Sets the engine compiling `expression` columns and filters.
    pub fn with_expression_engine(mut self, engine: Rc<dyn ExpressionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Dependency edges between the registered entities.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    fn entry(&self, id: TableId) -> Option<&TableEntry> {
        self.tables.get(id.0).and_then(Option::as_ref)
    }

    fn entry_mut(&mut self, id: TableId) -> Option<&mut TableEntry> {
        self.tables.get_mut(id.0).and_then(Option::as_mut)
    }

    fn session_entry(&self, id: SessionId) -> Option<&SessionEntry> {
        self.sessions.get(id.0).and_then(Option::as_ref)
    }

    fn session_entry_mut(&mut self, id: SessionId) -> Option<&mut SessionEntry> {
        self.sessions.get_mut(id.0).and_then(Option::as_mut)
    }

    fn lookup_table(&self, name: &str) -> Result<TableId> {
        self.table_names
            .get(name)
            .copied()
            .ok_or_else(|| Error::table_not_found(name))
    }

    fn lookup_session(&self, name: &str) -> Result<SessionId> {
        self.session_names
            .get(name)
            .copied()
            .ok_or_else(|| Error::session_not_found(name))
    }

    /// Returns the table registered under `name`.
    pub fn table(&self, name: &str) -> Option<&Table> {
        let id = self.table_names.get(name)?;
        self.entry(*id).map(|e| &e.table)
    }

    /// Returns the live view registered under `name`.
    pub fn session(&self, name: &str) -> Option<&LiveView> {
        let id = self.session_names.get(name)?;
        self.session_entry(*id).map(|e| &e.view)
    }

    pub fn table_count(&self) -> usize {
        self.table_names.len()
    }

    pub fn session_count(&self) -> usize {
        self.session_names.len()
    }

    /// Runs `f` on a table taken out of its slot, so the registry itself
    /// can serve as the resolver meanwhile.
    fn with_table<R>(&mut self, id: TableId, f: impl FnOnce(&mut Table, &Registry) -> R) -> Result<R> {
        let mut entry = self
            .tables
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or_else(|| Error::invalid_operation("table is not available"))?;
        let result = f(&mut entry.table, self);
        self.tables[id.0] = Some(entry);
        Ok(result)
    }

    /// Runs `f` on a view taken out of its slot, then queues whatever the
    /// view emitted.
    fn with_view<R>(
        &mut self,
        id: SessionId,
        f: impl FnOnce(&mut LiveView, &Table, &Registry) -> R,
    ) -> Result<R> {
        let mut entry = self
            .sessions
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or_else(|| Error::invalid_operation("session is not available"))?;
        let result = match self.entry(entry.source) {
            Some(source) => Ok(f(&mut entry.view, &source.table, self)),
            None => Err(Error::table_not_found(entry.view.id())),
        };
        if let Some(change) = entry.view.drain_change() {
            self.queue.push_back(Dispatch::Session(id, change));
        }
        self.sessions[id.0] = Some(entry);
        result
    }

    /// Registers resolve edges from the targets of `schema` to `node`.
    fn wire_resolve_edges(&mut self, node: &Node, schema: &Schema) -> Result<()> {
        let targets: Vec<Node> = schema
            .columns()
            .iter()
            .filter_map(|c| c.resolve.as_ref())
            .filter_map(resolve_target)
            .collect();
        for target in targets {
            if let Err(err) = self.graph.add_edge(target, node.clone(), EdgeKind::Resolve) {
                warn!(entity = %node, error = %err, "resolve dependency rejected");
                self.graph.remove_resolve_edges_into(node);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Creates a table, or returns the one already registered under `name`.
    ///
    /// Resolve columns may point at tables or views that do not exist yet;
    /// they resolve to their underlying value until the target appears.
    /// A resolve chain leading back to the table fails with
    /// `DependencyCycle`.
    pub fn create_table(&mut self, name: &str, columns: Vec<ColumnDef>, options: TableOptions) -> Result<TableId> {
        if let Some(&id) = self.table_names.get(name) {
            return Ok(id);
        }
        let table = Table::new(&self.config.namespace, name, columns, options, self.engine.as_deref())?;
        self.wire_resolve_edges(&Node::table(name), table.schema())?;

        let id = TableId(self.tables.len());
        debug!(table = %table.id(), columns = table.schema().len(), "table created");
        self.tables.push(Some(TableEntry {
            coalescer: table.options().coalesce.map(UpdateCoalescer::new),
            table,
            views: Vec::new(),
            mirror_of: None,
        }));
        self.table_names.insert(name.into(), id);
        Ok(id)
    }

    /// Replaces the columns of a table, carrying rows over by name.
    pub fn update_columns(&mut self, table: &str, columns: Vec<ColumnDef>) -> Result<()> {
        let id = self.lookup_table(table)?;
        let node = Node::table(table);
        let event = self.with_table(id, |table, registry| {
            table.update_columns(columns, registry.engine.as_deref(), registry)
        })??;

        self.graph.remove_resolve_edges_into(&node);
        let schema = self.entry(id).map(|e| e.table.schema().clone());
        if let Some(schema) = schema {
            self.wire_resolve_edges(&node, &schema)?;
        }
        self.publish_table(id, event);
        self.drain();
        Ok(())
    }

    /// Applies `mutation` to the named table and dispatches the result.
    pub fn mutate(&mut self, table: &str, mutation: Mutation, origin: Origin) -> Result<()> {
        let id = self.lookup_table(table)?;
        self.apply_mutation(id, mutation, origin)?;
        self.drain();
        Ok(())
    }

    pub fn add(&mut self, table: &str, rows: Vec<RowInput>) -> Result<()> {
        self.mutate(table, Mutation::Add(rows), Origin::local())
    }

    pub fn update(&mut self, table: &str, rows: Vec<RowInput>) -> Result<()> {
        self.mutate(table, Mutation::Update(rows), Origin::local())
    }

    pub fn remove(&mut self, table: &str, ids: Vec<Value>) -> Result<()> {
        self.mutate(table, Mutation::Remove(ids), Origin::local())
    }

    pub fn reset(&mut self, table: &str, rows: Option<Vec<RowInput>>) -> Result<()> {
        self.mutate(table, Mutation::Reset(rows), Origin::local())
    }

    fn apply_mutation(&mut self, id: TableId, mutation: Mutation, origin: Origin) -> Result<()> {
        let event = self.with_table(id, |table, registry| match mutation {
            Mutation::Add(rows) => table.add(rows, origin, registry),
            Mutation::Update(rows) => table.update(rows, origin, registry),
            Mutation::Remove(ids) => table.remove(&ids, origin),
            Mutation::Reset(rows) => Some(table.reset(rows, origin, registry)),
        })?;
        if let Some(event) = event {
            self.publish_table(id, event);
        }
        Ok(())
    }

    /// Queues a table event, or parks it in the table's coalescer.
    fn publish_table(&mut self, id: TableId, event: TableEvent) {
        let now = self.clock.now_ms();
        let Some(entry) = self.entry_mut(id) else {
            return;
        };
        let id_index = entry.table.schema().id_index();
        let event = match entry.coalescer.as_mut() {
            Some(coalescer) => {
                if let Some(batch) = TableBatch::from_event(event, id_index) {
                    coalescer.push(now, batch);
                }
                return;
            }
            None => event,
        };
        self.queue.push_back(Dispatch::Table(id, event));
    }

    fn drain(&mut self) {
        if self.dispatching {
            return;
        }
        self.dispatching = true;
        while let Some(dispatch) = self.queue.pop_front() {
            self.deliver(dispatch);
        }
        self.dispatching = false;
    }

    fn deliver(&mut self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Table(id, event) => self.deliver_table(id, event),
            Dispatch::Session(id, change) => self.deliver_session(id, change),
            Dispatch::Refresh(node) => self.refresh(node),
        }
    }

    fn deliver_table(&mut self, id: TableId, event: TableEvent) {
        let Some(entry) = self.entry_mut(id) else {
            return;
        };
        entry.table.emit(&event);
        let name = entry.table.name().to_string();
        let views = entry.views.clone();

        for session in views {
            let _ = self.with_view(session, |view, source, registry| view.apply(&event, source, registry));
        }
        self.schedule_dependents(&Node::Table(name));
    }

    fn deliver_session(&mut self, id: SessionId, change: ViewChange) {
        let now = self.clock.now_ms();
        let Some(entry) = self.session_entry_mut(id) else {
            return;
        };
        entry.view.emit(&change);
        let name = entry.view.id().to_string();

        let mirror = match (entry.mirror, entry.mirror_coalescer.as_mut()) {
            (Some(_), Some(coalescer)) => {
                coalescer.push(now, change);
                None
            }
            (Some(mirror), None) => Some((mirror, change)),
            (None, _) => None,
        };
        if let Some((mirror, change)) = mirror {
            self.apply_to_mirror(mirror, change);
        }
        self.schedule_dependents(&Node::Session(name));
    }

    /// Replays a view change on the table materialized from the view.
    fn apply_to_mirror(&mut self, mirror: TableId, change: ViewChange) {
        if !change.removed_ids.is_empty() {
            let _ = self.apply_mutation(mirror, Mutation::Remove(change.removed_ids), Origin::local());
        }
        let upserts: Vec<RowInput> = change
            .added_rows
            .into_iter()
            .chain(change.updated_rows)
            .map(RowInput::from)
            .collect();
        if !upserts.is_empty() {
            let _ = self.apply_mutation(mirror, Mutation::Update(upserts), Origin::local());
        }
    }

    /// Schedules a refresh of everything resolving against `node`.
    fn schedule_dependents(&mut self, node: &Node) {
        let dependents: Vec<Node> = self.graph.dependents_of_kind(node, EdgeKind::Resolve).cloned().collect();
        if dependents.is_empty() {
            return;
        }
        let now = self.clock.now_ms();
        for dependent in dependents {
            match self.config.refresh_coalesce {
                Some(config) => self
                    .refreshes
                    .entry(dependent)
                    .or_insert_with(|| UpdateCoalescer::new(config))
                    .push(now, ()),
                None => self.queue.push_back(Dispatch::Refresh(dependent)),
            }
        }
    }

    /// Recomputes every row of a resolve dependent.
    fn refresh(&mut self, node: Node) {
        match &node {
            Node::Table(name) => {
                let Some(&id) = self.table_names.get(name.as_str()) else {
                    return;
                };
                if let Ok(Some(event)) = self.with_table(id, |table, registry| table.refresh_derived(registry)) {
                    self.publish_table(id, event);
                }
            }
            Node::Session(name) => {
                let Some(&id) = self.session_names.get(name.as_str()) else {
                    return;
                };
                let _ = self.with_view(id, |view, source, registry| {
                    view.rebuild(source, registry, UpdateReason::Refresh)
                });
            }
        }
    }

    /// Creates a live view.
    ///
    /// Without an explicit `id` the view is named after a hash of its
    /// config, so identical declarations share one view when
    /// `reuse_existing` is set. Otherwise an existing name fails with
    /// `DuplicateSession`. Sub-sessions are created first, under their key
    /// unless they carry an id, and reused when already present. Views used
    /// as a source are materialized into a table named after the view.
    pub fn create_session(&mut self, config: SessionConfig, reuse_existing: bool) -> Result<SessionId> {
        let name = match &config.id {
            Some(id) => id.clone(),
            None => self.content_id(&config)?,
        };
        if let Some(&id) = self.session_names.get(name.as_str()) {
            return if reuse_existing {
                Ok(id)
            } else {
                Err(Error::duplicate_session(name))
            };
        }

        for (key, sub) in &config.sub_sessions {
            let mut sub = sub.clone();
            sub.id.get_or_insert_with(|| key.clone());
            self.create_session(sub, true)?;
        }
        let source = self.resolve_source(&config.table, &config.sub_sessions)?;
        let id = self.build_session(name, config, source)?;
        self.drain();
        Ok(id)
    }

    fn content_id(&self, config: &SessionConfig) -> Result<String> {
        let text = serde_json::to_string(config).map_err(|e| Error::invalid_config(e.to_string()))?;
        Ok(format!("session-{:016x}", self.hasher.hash_one(text.as_str())))
    }

    fn resolve_source(&mut self, table: &TableRef, sub_sessions: &BTreeMap<String, SessionConfig>) -> Result<TableId> {
        match table {
            TableRef::Name(name) => {
                if let Some(sub) = sub_sessions.get(name) {
                    let id = sub.id.as_deref().unwrap_or(name.as_str());
                    let session = self.lookup_session(id)?;
                    return self.materialize(session);
                }
                if let Some(&id) = self.table_names.get(name.as_str()) {
                    return Ok(id);
                }
                match self.session_names.get(name.as_str()) {
                    Some(&session) => self.materialize(session),
                    None => Err(Error::table_not_found(name.as_str())),
                }
            }
            TableRef::Inline(spec) => {
                let existed = self.table_names.contains_key(spec.name.as_str());
                let id = self.create_table(&spec.name, spec.columns.clone(), spec.options.clone())?;
                if !existed && !spec.rows.is_empty() {
                    self.apply_mutation(id, Mutation::Add(spec.rows.clone()), Origin::local())?;
                }
                Ok(id)
            }
            TableRef::Session(nested) => {
                let session = self.create_session((**nested).clone(), true)?;
                self.materialize(session)
            }
        }
    }

    fn build_session(&mut self, name: String, config: SessionConfig, source: TableId) -> Result<SessionId> {
        let source_name = self
            .entry(source)
            .map(|e| e.table.name().to_string())
            .ok_or_else(|| Error::invalid_operation("source table is not available"))?;
        let node = Node::session(name.as_str());
        self.graph
            .add_edge(Node::Table(source_name), node.clone(), EdgeKind::Source)?;

        let view = match self.entry(source) {
            Some(entry) => LiveView::new(name.as_str(), config, &entry.table, self.engine.clone(), self),
            None => Err(Error::invalid_operation("source table is not available")),
        };
        let view = match view {
            Ok(view) => view,
            Err(err) => {
                self.graph.remove_edges(&node, &[EdgeKind::Source]);
                return Err(err);
            }
        };
        if view.derives_columns() {
            if let Err(err) = self.wire_resolve_edges(&node, view.schema()) {
                self.graph.remove_edges(&node, &[EdgeKind::Source]);
                return Err(err);
            }
        }

        let id = SessionId(self.sessions.len());
        self.sessions.push(Some(SessionEntry {
            view,
            source,
            mirror: None,
            mirror_coalescer: None,
        }));
        self.session_names.insert(name, id);
        if let Some(entry) = self.entry_mut(source) {
            entry.views.push(id);
        }
        self.schedule_dependents(&node);
        Ok(id)
    }

    fn materialize(&mut self, session: SessionId) -> Result<TableId> {
        let entry = self
            .session_entry(session)
            .ok_or_else(|| Error::invalid_operation("session is not available"))?;
        match entry.mirror {
            Some(mirror) => Ok(mirror),
            None => {
                let name = entry.view.id().to_string();
                self.mirror(&name, session)
            }
        }
    }

    /// Builds, or reuses, the table `name` mirroring the view `session`.
    ///
    /// A grouped view's table is keyed by the first group key and receives
    /// the view's changes through a coalescer.
    pub fn create_table_from_live_view(&mut self, name: &str, session: &str) -> Result<TableId> {
        let id = self.lookup_session(session)?;
        let table = self.mirror(name, id)?;
        self.drain();
        Ok(table)
    }

    fn mirror(&mut self, name: &str, session: SessionId) -> Result<TableId> {
        let entry = self
            .session_entry(session)
            .ok_or_else(|| Error::invalid_operation("session is not available"))?;
        if let Some(mirror) = entry.mirror {
            return Ok(mirror);
        }
        let view_node = Node::session(entry.view.id());
        let grouped = entry.view.is_grouped();
        let columns = mirror_columns(entry.view.output_schema());

        self.graph
            .add_edge(view_node.clone(), Node::table(name), EdgeKind::Mirror)?;
        let table = match self.table_names.get(name) {
            Some(&existing) => existing,
            None => match self.create_table(name, columns, TableOptions::default()) {
                Ok(table) => table,
                Err(err) => {
                    self.graph.remove_edges(&view_node, &[EdgeKind::Mirror]);
                    return Err(err);
                }
            },
        };

        let rows = self.with_view(session, |view, source, registry| view.snapshot(source, registry))?;
        let inputs = rows.into_iter().map(RowInput::from).collect();
        self.apply_mutation(table, Mutation::Reset(Some(inputs)), Origin::local())?;

        let group_coalesce = self.config.group_coalesce;
        if let Some(entry) = self.session_entry_mut(session) {
            entry.mirror = Some(table);
            entry.mirror_coalescer = grouped.then(|| UpdateCoalescer::new(group_coalesce));
        }
        if let Some(entry) = self.entry_mut(table) {
            entry.mirror_of = Some(session);
        }
        debug!(table = name, grouped, "live view materialized");
        Ok(table)
    }

    /// Destroys a table and every view reading it.
    ///
    /// Pending coalesced events of the table are delivered first.
    /// Dependents resolving against the table are refreshed and fall back
    /// to their underlying values.
    pub fn destroy_table(&mut self, name: &str) -> Result<()> {
        let id = self.lookup_table(name)?;
        self.destroy_table_by_id(id);
        self.drain();
        Ok(())
    }

    fn destroy_table_by_id(&mut self, id: TableId) {
        let views = self.entry(id).map(|e| e.views.clone()).unwrap_or_default();
        for view in views {
            self.destroy_session_by_id(view);
        }

        let pending = self.entry_mut(id).and_then(|e| e.coalescer.as_mut()).and_then(UpdateCoalescer::flush);
        if let Some(batch) = pending {
            self.release_table(id, batch);
        }

        let Some(mut entry) = self.tables.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        let name = entry.table.name().to_string();
        self.table_names.remove(name.as_str());
        entry.table.destroy();
        if let Some(session) = entry.mirror_of {
            if let Some(view) = self.session_entry_mut(session) {
                view.mirror = None;
                view.mirror_coalescer = None;
            }
        }

        let node = Node::Table(name);
        self.graph.remove_edges(&node, &[EdgeKind::Mirror]);
        self.graph.remove_resolve_edges_into(&node);
        self.refreshes.remove(&node);
        debug!(table = %entry.table.id(), "table destroyed");
        self.schedule_dependents(&node);
    }

    /// Destroys a live view.
    ///
    /// A table materialized from the view is destroyed with it when no
    /// view, listener or resolve column reads that table any more.
    pub fn destroy_session(&mut self, name: &str) -> Result<()> {
        let id = self.lookup_session(name)?;
        self.destroy_session_by_id(id);
        self.drain();
        Ok(())
    }

    fn destroy_session_by_id(&mut self, id: SessionId) {
        let pending = self
            .session_entry_mut(id)
            .and_then(|e| e.mirror_coalescer.as_mut())
            .and_then(UpdateCoalescer::flush);
        if let Some(change) = pending {
            self.release_mirror(id, change);
        }

        let Some(mut entry) = self.sessions.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        let name = entry.view.id().to_string();
        self.session_names.remove(name.as_str());
        entry.view.destroy();
        if let Some(source) = self.entry_mut(entry.source) {
            source.views.retain(|&v| v != id);
        }

        let node = Node::Session(name);
        self.graph.remove_edges(&node, &[EdgeKind::Source, EdgeKind::Mirror]);
        self.graph.remove_resolve_edges_into(&node);
        self.refreshes.remove(&node);
        self.schedule_dependents(&node);

        if let Some(mirror) = entry.mirror {
            let idle = self.entry(mirror).is_some_and(|m| {
                m.views.is_empty()
                    && m.table.events().listener_count() == 0
                    && !self.graph.has_dependents(&Node::table(m.table.name()))
            });
            if idle {
                self.destroy_table_by_id(mirror);
            } else if let Some(m) = self.entry_mut(mirror) {
                m.mirror_of = None;
            }
        }
    }

    fn release_table(&mut self, id: TableId, batch: TableBatch) {
        let started = self.clock.now_ms();
        for event in batch.into_events() {
            self.queue.push_back(Dispatch::Table(id, event));
        }
        self.drain();
        let elapsed = self.clock.now_ms().saturating_sub(started);
        if let Some(coalescer) = self.entry_mut(id).and_then(|e| e.coalescer.as_mut()) {
            coalescer.record_duration(elapsed);
        }
    }

    fn release_mirror(&mut self, id: SessionId, change: ViewChange) {
        let started = self.clock.now_ms();
        if let Some(mirror) = self.session_entry(id).and_then(|e| e.mirror) {
            self.apply_to_mirror(mirror, change);
        }
        self.drain();
        let elapsed = self.clock.now_ms().saturating_sub(started);
        if let Some(coalescer) = self.session_entry_mut(id).and_then(|e| e.mirror_coalescer.as_mut()) {
            coalescer.record_duration(elapsed);
        }
    }

    fn release_refresh(&mut self, node: Node) {
        let started = self.clock.now_ms();
        self.queue.push_back(Dispatch::Refresh(node.clone()));
        self.drain();
        let elapsed = self.clock.now_ms().saturating_sub(started);
        if let Some(coalescer) = self.refreshes.get_mut(&node) {
            coalescer.record_duration(elapsed);
        }
    }

    /// Releases coalesced work. With `now`, only work that is due; without,
    /// everything pending.
    fn release(&mut self, now: Option<u64>) -> usize {
        let mut released = 0;

        for index in 0..self.tables.len() {
            let id = TableId(index);
            let batch = self
                .entry_mut(id)
                .and_then(|e| e.coalescer.as_mut())
                .and_then(|c| match now {
                    Some(now) => c.poll(now),
                    None => c.flush(),
                });
            if let Some(batch) = batch {
                released += 1;
                self.release_table(id, batch);
            }
        }

        for index in 0..self.sessions.len() {
            let id = SessionId(index);
            let change = self
                .session_entry_mut(id)
                .and_then(|e| e.mirror_coalescer.as_mut())
                .and_then(|c| match now {
                    Some(now) => c.poll(now),
                    None => c.flush(),
                });
            if let Some(change) = change {
                released += 1;
                self.release_mirror(id, change);
            }
        }

        let due: Vec<Node> = self
            .refreshes
            .iter_mut()
            .filter_map(|(node, c)| {
                let due = match now {
                    Some(now) => c.poll(now),
                    None => c.flush(),
                };
                due.map(|()| node.clone())
            })
            .collect();
        for node in due {
            released += 1;
            self.release_refresh(node);
        }

        released
    }

    /// Releases the coalesced work that is due.
    ///
    /// Returns the number of coalescers that released: one per table batch,
    /// per grouped view change and per refreshed resolve dependent. Work
    /// those deliveries cause downstream is not counted.
    pub fn run_pending(&mut self) -> usize {
        let now = self.clock.now_ms();
        let released = self.release(Some(now));
        if released > 0 {
            trace!(released, now, "pending work released");
        }
        released
    }

    /// Releases all coalesced work, including work queued while releasing.
    pub fn flush(&mut self) -> usize {
        let mut total = 0;
        loop {
            let released = self.release(None);
            if released == 0 {
                return total;
            }
            total += released;
        }
    }

    /// Earliest time at which `run_pending` has work to release.
    pub fn next_deadline(&self) -> Option<u64> {
        let tables = self
            .tables
            .iter()
            .flatten()
            .filter_map(|e| e.coalescer.as_ref()?.deadline());
        let mirrors = self
            .sessions
            .iter()
            .flatten()
            .filter_map(|e| e.mirror_coalescer.as_ref()?.deadline());
        let refreshes = self.refreshes.values().filter_map(UpdateCoalescer::deadline);
        tables.chain(mirrors).chain(refreshes).min()
    }

    /// Flushes pending work, then destroys every view and table.
    pub fn shutdown(&mut self) {
        self.flush();
        for index in 0..self.sessions.len() {
            self.destroy_session_by_id(SessionId(index));
        }
        for index in 0..self.tables.len() {
            self.destroy_table_by_id(TableId(index));
        }
        self.drain();
        self.flush();
        self.refreshes.clear();
        debug!(namespace = %self.config.namespace, "registry shut down");
    }

    /// Returns a page of a view's rows, see `LiveView::get_data`.
    pub fn get_data(&mut self, session: &str, request: &DataRequest) -> Result<Vec<Row>> {
        let id = self.lookup_session(session)?;
        let rows = self.with_view(id, |view, source, registry| view.get_data(source, request, registry))??;
        self.drain();
        Ok(rows)
    }

    /// Groups a view's rows by its `group_by` keys.
    pub fn group_data(&mut self, session: &str) -> Result<Grouping> {
        let id = self.lookup_session(session)?;
        let grouping = self.with_view(id, |view, source, registry| view.group_data(source, registry))??;
        self.drain();
        Ok(grouping)
    }

    /// Groups the rows of a view whose identity is in `selected_ids`.
    pub fn group_selected_data(&mut self, session: &str, selected_ids: &[Value]) -> Result<Grouping> {
        let id = self.lookup_session(session)?;
        let grouping = self.with_view(id, |view, source, registry| {
            view.group_selected_data(source, registry, selected_ids)
        })??;
        self.drain();
        Ok(grouping)
    }

    /// Replaces a view's filter, applied on the next read.
    ///
    /// A view that is materialized or read by resolve columns is refiltered
    /// at once, so neither ever sees the previous members.
    pub fn set_filter(&mut self, session: &str, filter: Vec<Filter>) -> Result<()> {
        let id = self.lookup_session(session)?;
        self.with_view(id, |view, _, _| view.set_filter(filter))??;

        let node = Node::session(session);
        let mirrored = self.session_entry(id).is_some_and(|e| e.mirror.is_some());
        if mirrored || self.graph.dependents_of_kind(&node, EdgeKind::Resolve).next().is_some() {
            self.with_view(id, |view, source, registry| view.sync(source, registry))?;
            self.drain();
        }
        Ok(())
    }

    /// Replaces a view's sort, applied on the next read.
    pub fn set_sort(&mut self, session: &str, sort: Vec<SortSpec>) -> Result<()> {
        let id = self.lookup_session(session)?;
        self.with_view(id, |view, _, _| view.set_sort(sort))?
    }

    /// Listens to the events of a table.
    pub fn on_table<F>(&mut self, table: &str, event: &str, handler: F) -> Result<ListenerId>
    where
        F: FnMut(&TableEvent) + 'static,
    {
        let id = self.lookup_table(table)?;
        self.entry_mut(id)
            .map(|e| e.table.events_mut().on(event, handler))
            .ok_or_else(|| Error::table_not_found(table))
    }

    /// Removes a table listener.
    pub fn off_table(&mut self, table: &str, listener: ListenerId) -> bool {
        let Ok(id) = self.lookup_table(table) else {
            return false;
        };
        self.entry_mut(id).is_some_and(|e| e.table.events_mut().off(listener))
    }

    /// Listens to the events of a live view.
    pub fn on_session<F>(&mut self, session: &str, event: &str, handler: F) -> Result<ListenerId>
    where
        F: FnMut(&ViewEvent) + 'static,
    {
        let id = self.lookup_session(session)?;
        self.session_entry_mut(id)
            .map(|e| e.view.events_mut().on(event, handler))
            .ok_or_else(|| Error::session_not_found(session))
    }

    /// Removes a live view listener.
    pub fn off_session(&mut self, session: &str, listener: ListenerId) -> bool {
        let Ok(id) = self.lookup_session(session) else {
            return false;
        };
        self.session_entry_mut(id).is_some_and(|e| e.view.events_mut().off(listener))
    }
}

impl Resolve for Registry {
    /// Looks the underlying field up in the target table or view.
    ///
    /// A missing target or row yields the underlying value itself, a
    /// removed child row yields Null.
    fn resolve(&self, spec: &ResolveSpec, row: &RowRef<'_>) -> Value {
        let key = row.get(&spec.underlying_field);
        if key.is_null() {
            return Value::Null;
        }

        if let Some(session) = &spec.session {
            return match self.session(session) {
                Some(view) => match view.get_by_id(key) {
                    Some(child) => display(spec, view.output_schema(), child),
                    None => key.clone(),
                },
                None => {
                    trace!(session = %session, "resolve target not registered");
                    key.clone()
                }
            };
        }

        let Some(name) = &spec.children_table else {
            return key.clone();
        };
        match self.table(name) {
            Some(table) => match table.get_by_id(key) {
                Some(child) => display(spec, table.schema(), child),
                None if table.is_tombstoned(key) => Value::Null,
                None => key.clone(),
            },
            None => {
                trace!(table = %name, "resolve target not registered");
                key.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use core::cell::RefCell;
    use horizon_core::schema::Aggregator;
    use horizon_reactive::{CoalesceConfig, ManualClock};

    fn registry() -> (Registry, ManualClock) {
        let clock = ManualClock::new();
        let config = RegistryConfig::default().namespace("test");
        (Registry::new(config, Rc::new(clock.clone())), clock)
    }

    fn row(fields: &[(&str, Value)]) -> RowInput {
        RowInput::named(fields.iter().cloned())
    }

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter().filter_map(|r| r.get(0).and_then(Value::as_i64)).collect()
    }

    fn users(registry: &mut Registry) {
        registry
            .create_table(
                "users",
                vec![ColumnDef::new("id").primary_key(), ColumnDef::new("status")],
                TableOptions::default(),
            )
            .unwrap();
        registry
            .add(
                "users",
                vec![
                    row(&[("id", 1i64.into()), ("status", "active".into())]),
                    row(&[("id", 2i64.into()), ("status", "inactive".into())]),
                    row(&[("id", 3i64.into()), ("status", "active".into())]),
                ],
            )
            .unwrap();
    }

    #[test]
    fn test_create_table_is_idempotent() {
        let (mut registry, _) = registry();
        let a = registry
            .create_table("t", vec![ColumnDef::new("id")], TableOptions::default())
            .unwrap();
        let b = registry
            .create_table("t", vec![ColumnDef::new("other")], TableOptions::default())
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.table("t").unwrap().id(), "test.t");
        assert_eq!(registry.table_count(), 1);
    }

    #[test]
    fn test_session_follows_table() {
        let (mut registry, _) = registry();
        users(&mut registry);
        let config = SessionConfig::new("users")
            .id("active")
            .permanent_filter(vec![Filter::eq("status", "active")]);
        registry.create_session(config, false).unwrap();

        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        registry
            .on_session("active", "dataUpdate", move |e| {
                if let ViewEvent::DataUpdate(change) = e {
                    sink.borrow_mut().push(change.added_ids.clone());
                }
            })
            .unwrap();

        registry
            .add("users", vec![row(&[("id", 4i64.into()), ("status", "active".into())])])
            .unwrap();
        assert_eq!(*changes.borrow(), vec![vec![Value::Int64(4)]]);
        let rows = registry.get_data("active", &DataRequest::default()).unwrap();
        assert_eq!(ids(&rows), vec![1, 3, 4]);
    }

    #[test]
    fn test_duplicate_and_reused_sessions() {
        let (mut registry, _) = registry();
        users(&mut registry);
        let config = SessionConfig::new("users").filter(vec![Filter::eq("status", "active")]);

        let a = registry.create_session(config.clone(), false).unwrap();
        let b = registry.create_session(config.clone(), true).unwrap();
        assert_eq!(a, b);
        let err = registry.create_session(config, false).unwrap_err();
        assert!(matches!(err, Error::DuplicateSession { .. }));

        let err = registry.create_session(SessionConfig::new("missing"), false).unwrap_err();
        assert_eq!(err, Error::table_not_found("missing"));
    }

    #[test]
    fn test_content_id_is_stable_across_registries() {
        let config = SessionConfig::new("users").filter(vec![Filter::eq("status", "active")]);
        let (first, _) = registry();
        let (second, _) = registry();

        let id = first.content_id(&config).unwrap();
        assert!(id.starts_with("session-"));
        assert_eq!(id, second.content_id(&config).unwrap());
        assert_ne!(id, first.content_id(&SessionConfig::new("users")).unwrap());
    }

    #[test]
    fn test_resolve_to_table() {
        let (mut registry, _) = registry();
        registry
            .create_table(
                "countries",
                vec![ColumnDef::new("code").primary_key(), ColumnDef::new("name")],
                TableOptions::default(),
            )
            .unwrap();
        registry
            .add("countries", vec![row(&[("code", "fr".into()), ("name", "France".into())])])
            .unwrap();
        registry
            .create_table(
                "cities",
                vec![
                    ColumnDef::new("id").primary_key(),
                    ColumnDef::new("country"),
                    ColumnDef::new("country_name").resolve(ResolveSpec::table("country", "countries", "name")),
                    ColumnDef::new("label")
                        .resolve(ResolveSpec::table("country", "countries", "name").with_template("[{{code}}]")),
                ],
                TableOptions::default(),
            )
            .unwrap();
        registry
            .add(
                "cities",
                vec![
                    row(&[("id", 1i64.into()), ("country", "fr".into())]),
                    row(&[("id", 2i64.into()), ("country", "de".into())]),
                ],
            )
            .unwrap();

        let cities = registry.table("cities").unwrap();
        let paris = cities.get_by_id(&Value::Int64(1)).unwrap();
        assert_eq!(paris.get(2), Some(&Value::from("France")));
        assert_eq!(paris.get(3), Some(&Value::from("[fr]")));
        assert_eq!(cities.get_by_id(&Value::Int64(2)).unwrap().get(2), Some(&Value::from("de")));

        registry.remove("countries", vec![Value::from("fr")]).unwrap();
        registry.flush();
        let paris = registry.table("cities").unwrap().get_by_id(&Value::Int64(1)).unwrap();
        assert_eq!(paris.get(2), Some(&Value::Null));
    }

    #[test]
    fn test_resolve_cycle_rejected() {
        let (mut registry, _) = registry();
        let err = registry
            .create_table(
                "nodes",
                vec![
                    ColumnDef::new("id").primary_key(),
                    ColumnDef::new("parent"),
                    ColumnDef::new("parent_name").resolve(ResolveSpec::table("parent", "nodes", "id")),
                ],
                TableOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::DependencyCycle { .. }));
        assert!(registry.table("nodes").is_none());
        assert_eq!(registry.graph().edge_count(), 0);
    }

    #[test]
    fn test_refresh_is_coalesced() {
        let (mut registry, clock) = registry();
        registry
            .create_table(
                "orders",
                vec![
                    ColumnDef::new("id").primary_key(),
                    ColumnDef::new("sku"),
                    ColumnDef::new("title").resolve(ResolveSpec::table("sku", "products", "title")),
                ],
                TableOptions::default(),
            )
            .unwrap();
        registry.add("orders", vec![row(&[("id", 1i64.into()), ("sku", "a".into())])]).unwrap();
        registry
            .create_table(
                "products",
                vec![ColumnDef::new("sku").primary_key(), ColumnDef::new("title")],
                TableOptions::default(),
            )
            .unwrap();

        let updates = Rc::new(RefCell::new(0));
        let sink = updates.clone();
        registry
            .on_table("orders", "dataUpdate", move |_| *sink.borrow_mut() += 1)
            .unwrap();

        registry.add("products", vec![row(&[("sku", "a".into()), ("title", "Apple".into())])]).unwrap();
        registry.update("products", vec![row(&[("sku", "a".into()), ("title", "Apricot".into())])]).unwrap();
        assert_eq!(*updates.borrow(), 0);
        assert_eq!(registry.next_deadline(), Some(16));

        clock.set(10);
        assert_eq!(registry.run_pending(), 0);
        clock.set(16);
        assert_eq!(registry.run_pending(), 1);
        assert_eq!(*updates.borrow(), 1);
        let order = registry.table("orders").unwrap().get_by_id(&Value::Int64(1)).unwrap();
        assert_eq!(order.get(2), Some(&Value::from("Apricot")));
    }

    #[test]
    fn test_table_coalescing() {
        let (mut registry, clock) = registry();
        let options = TableOptions {
            coalesce: Some(CoalesceConfig::new(5, 50)),
            ..TableOptions::default()
        };
        registry
            .create_table("ticks", vec![ColumnDef::new("id").primary_key(), ColumnDef::new("v")], options)
            .unwrap();
        registry.create_session(SessionConfig::new("ticks").id("all"), false).unwrap();

        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        registry
            .on_session("all", "dataUpdate", move |e| {
                if let ViewEvent::DataUpdate(change) = e {
                    sink.borrow_mut().push(change.clone());
                }
            })
            .unwrap();

        registry.add("ticks", vec![row(&[("id", 1i64.into()), ("v", 1i64.into())])]).unwrap();
        registry.update("ticks", vec![row(&[("id", 1i64.into()), ("v", 2i64.into())])]).unwrap();
        registry.add("ticks", vec![row(&[("id", 2i64.into()), ("v", 1i64.into())])]).unwrap();
        registry.remove("ticks", vec![Value::Int64(2)]).unwrap();
        assert!(changes.borrow().is_empty());

        clock.set(5);
        assert_eq!(registry.run_pending(), 1);
        let changes = changes.borrow();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].added_ids, vec![Value::Int64(1)]);
        assert_eq!(changes[0].added_rows[0].get(1), Some(&Value::Int64(2)));
        assert!(changes[0].removed_ids.is_empty());
    }

    #[test]
    fn test_grouped_view_materialization() {
        let (mut registry, _) = registry();
        registry
            .create_table(
                "sales",
                vec![
                    ColumnDef::new("id").primary_key(),
                    ColumnDef::new("region"),
                    ColumnDef::new("amount").aggregator(Aggregator::Sum),
                ],
                TableOptions::default(),
            )
            .unwrap();
        registry
            .add(
                "sales",
                vec![
                    row(&[("id", 1i64.into()), ("region", "east".into()), ("amount", 10i64.into())]),
                    row(&[("id", 2i64.into()), ("region", "west".into()), ("amount", 4i64.into())]),
                ],
            )
            .unwrap();
        registry
            .create_session(SessionConfig::new("sales").id("by_region").group_by(["region"]), false)
            .unwrap();
        registry.create_table_from_live_view("region_totals", "by_region").unwrap();

        let totals = registry.table("region_totals").unwrap();
        assert_eq!(totals.schema().id_property(), "region");
        assert_eq!(totals.get_by_id(&Value::from("east")).unwrap().get(2), Some(&Value::Int64(10)));

        registry
            .add("sales", vec![row(&[("id", 3i64.into()), ("region", "east".into()), ("amount", 5i64.into())])])
            .unwrap();
        let east = registry.table("region_totals").unwrap().get_by_id(&Value::from("east")).unwrap();
        assert_eq!(east.get(2), Some(&Value::Int64(10)));

        registry.flush();
        let east = registry.table("region_totals").unwrap().get_by_id(&Value::from("east")).unwrap();
        assert_eq!(east.get(2), Some(&Value::Int64(15)));
    }

    #[test]
    fn test_destroy_session_tears_down_idle_mirror() {
        let (mut registry, _) = registry();
        users(&mut registry);
        let inner = SessionConfig::new("users").id("active").filter(vec![Filter::eq("status", "active")]);
        registry
            .create_session(SessionConfig::new(inner).id("outer"), false)
            .unwrap();
        assert!(registry.table("active").is_some());
        assert_eq!(ids(&registry.get_data("outer", &DataRequest::default()).unwrap()), vec![1, 3]);

        registry.destroy_session("outer").unwrap();
        assert!(registry.table("active").is_some());
        registry.destroy_session("active").unwrap();
        assert!(registry.table("active").is_none());
        assert!(registry.session("active").is_none());
    }

    #[test]
    fn test_destroy_table_destroys_views() {
        let (mut registry, _) = registry();
        users(&mut registry);
        registry.create_session(SessionConfig::new("users").id("all"), false).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        registry
            .on_session("all", "destroy", move |_| sink.borrow_mut().push("session"))
            .unwrap();
        let sink = seen.clone();
        registry
            .on_table("users", "destroy", move |_| sink.borrow_mut().push("table"))
            .unwrap();

        registry.destroy_table("users").unwrap();
        assert_eq!(*seen.borrow(), ["session", "table"]);
        assert_eq!(registry.session_count(), 0);
        assert_eq!(registry.add("users", vec![]), Err(Error::table_not_found("users")));
    }

    #[test]
    fn test_shutdown_flushes() {
        let (mut registry, _) = registry();
        let options = TableOptions {
            coalesce: Some(CoalesceConfig::default()),
            ..TableOptions::default()
        };
        registry
            .create_table("t", vec![ColumnDef::new("id").primary_key()], options)
            .unwrap();
        registry.create_session(SessionConfig::new("t").id("v"), false).unwrap();
        let seen = Rc::new(RefCell::new(0));
        let sink = seen.clone();
        registry.on_table("t", "dataUpdate", move |_| *sink.borrow_mut() += 1).unwrap();

        registry.add("t", vec![row(&[("id", 1i64.into())])]).unwrap();
        registry.shutdown();
        assert_eq!(*seen.borrow(), 1);
        assert_eq!(registry.table_count(), 0);
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn test_resolve_to_session() {
        let (mut registry, _) = registry();
        registry
            .create_table(
                "people",
                vec![
                    ColumnDef::new("id").primary_key(),
                    ColumnDef::new("team"),
                    ColumnDef::new("team_title").resolve(ResolveSpec::session("team", "open_teams", "title")),
                ],
                TableOptions::default(),
            )
            .unwrap();
        registry.add("people", vec![row(&[("id", 1i64.into()), ("team", "core".into())])]).unwrap();
        registry
            .create_table(
                "teams",
                vec![
                    ColumnDef::new("id").primary_key(),
                    ColumnDef::new("title"),
                    ColumnDef::new("open"),
                ],
                TableOptions::default(),
            )
            .unwrap();
        registry
            .add(
                "teams",
                vec![row(&[("id", "core".into()), ("title", "Core".into()), ("open", true.into())])],
            )
            .unwrap();
        let person = registry.table("people").unwrap().get_by_id(&Value::Int64(1)).unwrap();
        assert_eq!(person.get(2), Some(&Value::from("core")));

        let config = SessionConfig::new("teams")
            .id("open_teams")
            .permanent_filter(vec![Filter::eq("open", true)]);
        registry.create_session(config, false).unwrap();
        registry.flush();
        let person = registry.table("people").unwrap().get_by_id(&Value::Int64(1)).unwrap();
        assert_eq!(person.get(2), Some(&Value::from("Core")));

        registry
            .update("teams", vec![row(&[("id", "core".into()), ("open", false.into())])])
            .unwrap();
        registry.flush();
        let person = registry.table("people").unwrap().get_by_id(&Value::Int64(1)).unwrap();
        assert_eq!(person.get(2), Some(&Value::from("core")));
    }

    #[test]
    fn test_filter_change_reaches_resolve_dependents() {
        let (mut registry, _) = registry();
        registry
            .create_table(
                "people",
                vec![
                    ColumnDef::new("id").primary_key(),
                    ColumnDef::new("team"),
                    ColumnDef::new("team_title").resolve(ResolveSpec::session("team", "listed_teams", "title")),
                ],
                TableOptions::default(),
            )
            .unwrap();
        registry.add("people", vec![row(&[("id", 1i64.into()), ("team", "core".into())])]).unwrap();
        registry
            .create_table(
                "teams",
                vec![ColumnDef::new("id").primary_key(), ColumnDef::new("title"), ColumnDef::new("open")],
                TableOptions::default(),
            )
            .unwrap();
        registry
            .add(
                "teams",
                vec![
                    row(&[("id", "core".into()), ("title", "Core".into()), ("open", true.into())]),
                    row(&[("id", "web".into()), ("title", "Web".into()), ("open", false.into())]),
                ],
            )
            .unwrap();
        let config = SessionConfig::new("teams")
            .id("listed_teams")
            .filter(vec![Filter::eq("open", true)]);
        registry.create_session(config, false).unwrap();
        registry.flush();
        let title = |registry: &Registry| {
            let person = registry.table("people").unwrap().get_by_id(&Value::Int64(1)).unwrap();
            person.get(2).cloned()
        };
        assert_eq!(title(&registry), Some(Value::from("Core")));

        registry.set_filter("listed_teams", vec![Filter::eq("open", false)]).unwrap();
        assert!(!registry.session("listed_teams").unwrap().require_filtering());
        registry.flush();
        assert_eq!(title(&registry), Some(Value::from("core")));
    }

    #[test]
    fn test_filter_change_reaches_mirror() {
        let (mut registry, _) = registry();
        users(&mut registry);
        registry
            .create_session(
                SessionConfig::new("users").id("active").filter(vec![Filter::eq("status", "active")]),
                false,
            )
            .unwrap();
        registry.create_table_from_live_view("active_copy", "active").unwrap();

        registry.set_filter("active", vec![Filter::eq("status", "inactive")]).unwrap();
        let copy: Vec<Row> = registry.table("active_copy").unwrap().rows().cloned().collect();
        assert_eq!(ids(&copy), vec![2]);
    }

    #[test]
    fn test_update_columns_reaches_views() {
        let (mut registry, _) = registry();
        users(&mut registry);
        registry.create_session(SessionConfig::new("users").id("all"), false).unwrap();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        registry
            .on_session("all", "dataUpdate", move |e| {
                if let ViewEvent::DataUpdate(change) = e {
                    sink.borrow_mut().push(change.clone());
                }
            })
            .unwrap();

        registry
            .update_columns(
                "users",
                vec![
                    ColumnDef::new("id").primary_key(),
                    ColumnDef::new("status"),
                    ColumnDef::new("label").value_template("{{status}}!"),
                ],
            )
            .unwrap();

        let changes = changes.borrow();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].update_reason, UpdateReason::ColumnsChanged);
        assert_eq!(changes[0].updated_ids.len(), 3);
        let view = registry.session("all").unwrap();
        assert_eq!(view.schema().len(), 3);
        assert_eq!(
            view.get_by_id(&Value::Int64(1)).unwrap().get(2),
            Some(&Value::from("active!"))
        );
    }

    #[test]
    fn test_group_selected_data() {
        let (mut registry, _) = registry();
        users(&mut registry);
        registry
            .create_session(SessionConfig::new("users").id("by_status").group_by(["status"]), false)
            .unwrap();

        let all = registry.group_data("by_status").unwrap();
        assert_eq!(all.len(), 2);
        let selected = registry
            .group_selected_data("by_status", &[Value::Int64(1), Value::Int64(3)])
            .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected.groups()[0].key, Value::from("active"));
        assert!(registry.group_data("missing").is_err());
    }

    #[test]
    fn test_off_listeners() {
        let (mut registry, _) = registry();
        users(&mut registry);
        registry.create_session(SessionConfig::new("users").id("all"), false).unwrap();
        let seen = Rc::new(RefCell::new(0));

        let sink = seen.clone();
        let table_listener = registry
            .on_table("users", "dataUpdate", move |_| *sink.borrow_mut() += 1)
            .unwrap();
        let sink = seen.clone();
        let view_listener = registry
            .on_session("all", "dataUpdate", move |_| *sink.borrow_mut() += 10)
            .unwrap();

        registry.add("users", vec![row(&[("id", 9i64.into()), ("status", "active".into())])]).unwrap();
        assert_eq!(*seen.borrow(), 11);

        assert!(registry.off_table("users", table_listener));
        assert!(registry.off_session("all", view_listener));
        assert!(!registry.off_session("all", view_listener));
        registry.add("users", vec![row(&[("id", 10i64.into()), ("status", "active".into())])]).unwrap();
        assert_eq!(*seen.borrow(), 11);
    }
}
