// 🪞 Selection Mirror
// Keeps a grid widget's node-level selection and a TableStore's selected
// collection consistent in both directions, without feedback loops.
//
// Single-threaded and cooperative: the SyncState only guards against
// notifications the mirror itself caused, it is not a lock.

use crate::record::{Keyed, RowKey};
use crate::store::TableStore;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, trace};

// ============================================================================
// GRID WIDGET SEAM
// ============================================================================

/// GridWidget - the third-party grid as seen by the mirror
///
/// Each mutation that changes a node's selected flag produces a selection
/// notification; the host collects them with `take_notifications`.
pub trait GridWidget<T> {
    fn rows(&self) -> &[T];
    fn is_selected(&self, index: usize) -> bool;
    fn deselect_all(&mut self);
    fn set_selected(&mut self, index: usize, selected: bool);
    fn set_rows(&mut self, rows: Vec<T>);

    /// Number of selection-changed notifications emitted since the last call
    fn take_notifications(&mut self) -> usize;

    fn selected_rows(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.rows()
            .iter()
            .enumerate()
            .filter(|(i, _)| self.is_selected(*i))
            .map(|(_, row)| row.clone())
            .collect()
    }
}

/// MemoryGrid - in-process grid with one boolean flag per node
#[derive(Debug, Clone)]
pub struct MemoryGrid<T> {
    rows: Vec<T>,
    selected: Vec<bool>,
    pending: usize,
}

impl<T> MemoryGrid<T> {
    pub fn new(rows: Vec<T>) -> Self {
        let selected = vec![false; rows.len()];
        MemoryGrid {
            rows,
            selected,
            pending: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn toggle(&mut self, index: usize) {
        if let Some(flag) = self.selected.get(index).copied() {
            self.set_selected(index, !flag);
        }
    }

    pub fn select_all(&mut self) {
        if self.selected.iter().any(|s| !s) {
            self.selected.iter_mut().for_each(|s| *s = true);
            self.pending += 1;
        }
    }

    pub fn selected_count(&self) -> usize {
        self.selected.iter().filter(|s| **s).count()
    }
}

impl<T> Default for MemoryGrid<T> {
    fn default() -> Self {
        MemoryGrid::new(Vec::new())
    }
}

impl<T> GridWidget<T> for MemoryGrid<T> {
    fn rows(&self) -> &[T] {
        &self.rows
    }

    fn is_selected(&self, index: usize) -> bool {
        self.selected.get(index).copied().unwrap_or(false)
    }

    fn deselect_all(&mut self) {
        if self.selected.iter().any(|s| *s) {
            self.selected.iter_mut().for_each(|s| *s = false);
            self.pending += 1;
        }
    }

    fn set_selected(&mut self, index: usize, selected: bool) {
        if let Some(flag) = self.selected.get_mut(index) {
            if *flag != selected {
                *flag = selected;
                self.pending += 1;
            }
        }
    }

    fn set_rows(&mut self, rows: Vec<T>) {
        let had_selection = self.selected.iter().any(|s| *s);
        self.selected = vec![false; rows.len()];
        self.rows = rows;
        if had_selection {
            self.pending += 1;
        }
    }

    fn take_notifications(&mut self) -> usize {
        std::mem::take(&mut self.pending)
    }
}

// ============================================================================
// MIRROR STATE MACHINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No sync in progress; widget notifications are user changes
    Idle,
    /// Store → widget push applied; its echo notifications are pending
    SyncingFromStore,
    /// Widget → store write in progress
    SyncingFromWidget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Notification caused by our own sync, dropped
    Ignored,
    /// Store selection already reflected in the widget
    Unchanged,
    PushedToStore,
    PushedToWidget,
}

/// SelectionMirror - one per table instance
#[derive(Debug, Clone)]
pub struct SelectionMirror {
    state: SyncState,
    seen_revision: Option<u64>,
}

impl Default for SelectionMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionMirror {
    pub fn new() -> Self {
        SelectionMirror {
            state: SyncState::Idle,
            seen_revision: None,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Widget → store: the widget reported a selection change
    pub fn widget_changed<T, G>(&mut self, grid: &G, store: &mut TableStore<T>) -> SyncAction
    where
        T: Keyed + Clone,
        G: GridWidget<T>,
    {
        if self.state != SyncState::Idle {
            trace!(state = ?self.state, "ignoring widget notification during sync");
            return SyncAction::Ignored;
        }

        self.state = SyncState::SyncingFromWidget;
        let id_field = store.id_field();
        let keys = grid_keys(grid, id_field);
        // a widget still showing replaced rows only selects what the store holds
        let rows: Vec<T> = store
            .all_rows()
            .iter()
            .filter(|row| row.key(id_field).map_or(false, |k| keys.contains(&k)))
            .cloned()
            .collect();
        store.set_selected_rows(rows);
        self.seen_revision = Some(store.selection_revision());
        self.state = SyncState::Idle;

        debug!(selected = store.selected_count(), "widget selection pushed to store");
        SyncAction::PushedToStore
    }

    /// Store → widget: the store's selected collection may have been replaced
    ///
    /// A new revision arriving while a previous push is still unsettled is applied again.
    pub fn store_changed<T, G>(&mut self, grid: &mut G, store: &TableStore<T>) -> SyncAction
    where
        T: Keyed + Clone,
        G: GridWidget<T>,
    {
        let revision = store.selection_revision();
        if self.seen_revision == Some(revision) {
            return SyncAction::Unchanged;
        }

        self.state = SyncState::SyncingFromStore;
        let keys: HashSet<RowKey> = store.selected_keys();

        grid.deselect_all();
        if !keys.is_empty() {
            let id_field = store.id_field();
            let to_select: Vec<usize> = grid
                .rows()
                .iter()
                .enumerate()
                .filter(|(_, row)| row.key(id_field).map_or(false, |k| keys.contains(&k)))
                .map(|(i, _)| i)
                .collect();
            for index in to_select {
                grid.set_selected(index, true);
            }
        }

        self.seen_revision = Some(revision);
        debug!(selected = keys.len(), revision, "store selection pushed to widget");
        SyncAction::PushedToWidget
    }

    /// Deferred clear: run after the widget's echo notifications were delivered
    pub fn settle(&mut self) {
        if self.state == SyncState::SyncingFromStore {
            self.state = SyncState::Idle;
        }
    }
}

/// Keys of the rows a widget has selected
fn grid_keys<T, G>(grid: &G, id_field: &str) -> HashSet<RowKey>
where
    T: Keyed,
    G: GridWidget<T>,
{
    grid.rows()
        .iter()
        .enumerate()
        .filter(|(i, _)| grid.is_selected(*i))
        .filter_map(|(_, row)| row.key(id_field))
        .collect()
}

// ============================================================================
// EVENT LOOP HOST
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    WidgetSelection,
    StoreSelection,
    StoreRows,
}

/// TickReport - what one event-loop turn did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub delivered: usize,
    pub ignored: usize,
    pub pushed_to_store: usize,
    pub pushed_to_widget: usize,
}

impl TickReport {
    /// Notifications that crossed from one side to the other
    pub fn cross_notifications(&self) -> usize {
        self.pushed_to_store + self.pushed_to_widget
    }

    fn record(&mut self, action: SyncAction) {
        match action {
            SyncAction::Ignored => self.ignored += 1,
            SyncAction::Unchanged => {}
            SyncAction::PushedToStore => self.pushed_to_store += 1,
            SyncAction::PushedToWidget => self.pushed_to_widget += 1,
        }
    }
}

/// SyncedTable - a store, a widget and the mirror between them
///
/// Mutations enqueue the notifications they cause; `tick` delivers them in
/// order, then settles the mirror.
pub struct SyncedTable<T, G> {
    store: TableStore<T>,
    grid: G,
    mirror: SelectionMirror,
    queue: VecDeque<LoopEvent>,
}

impl<T, G> SyncedTable<T, G>
where
    T: Keyed + Clone,
    G: GridWidget<T>,
{
    pub fn new(store: TableStore<T>, mut grid: G) -> Self {
        grid.set_rows(store.all_rows().to_vec());
        grid.take_notifications();

        let mut table = SyncedTable {
            store,
            grid,
            mirror: SelectionMirror::new(),
            queue: VecDeque::new(),
        };
        table.queue.push_back(LoopEvent::StoreSelection);
        table.tick();
        table
    }

    pub fn store(&self) -> &TableStore<T> {
        &self.store
    }

    pub fn grid(&self) -> &G {
        &self.grid
    }

    pub fn mirror(&self) -> &SelectionMirror {
        &self.mirror
    }

    pub fn into_parts(self) -> (TableStore<T>, G) {
        (self.store, self.grid)
    }

    /// A user-side change in the widget
    pub fn widget_mut<R>(&mut self, f: impl FnOnce(&mut G) -> R) -> R {
        let out = f(&mut self.grid);
        self.collect_widget_notifications();
        out
    }

    /// A program-side change in the store
    pub fn store_mut<R>(&mut self, f: impl FnOnce(&mut TableStore<T>) -> R) -> R {
        let rows_rev = self.store.rows_revision();
        let sel_rev = self.store.selection_revision();

        let out = f(&mut self.store);

        if self.store.rows_revision() != rows_rev {
            self.queue.push_back(LoopEvent::StoreRows);
        }
        if self.store.selection_revision() != sel_rev {
            self.queue.push_back(LoopEvent::StoreSelection);
        }
        out
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Deliver every queued notification, then run the deferred settle
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        while let Some(event) = self.queue.pop_front() {
            report.delivered += 1;
            let action = match event {
                LoopEvent::WidgetSelection => {
                    self.mirror.widget_changed(&self.grid, &mut self.store)
                }
                LoopEvent::StoreRows => {
                    self.grid.set_rows(self.store.all_rows().to_vec());
                    self.collect_widget_notifications();
                    // the widget lost its flags; force the selection back in
                    self.mirror.seen_revision = None;
                    self.mirror.store_changed(&mut self.grid, &self.store)
                }
                LoopEvent::StoreSelection => self.mirror.store_changed(&mut self.grid, &self.store),
            };

            report.record(action);
            self.collect_widget_notifications();
        }

        self.mirror.settle();
        report
    }

    /// Keys selected in the widget
    pub fn widget_keys(&self) -> HashSet<RowKey> {
        grid_keys(&self.grid, self.store.id_field())
    }

    /// True when both sides agree on the selected keys
    pub fn is_consistent(&self) -> bool {
        self.widget_keys() == self.store.selected_keys()
    }

    fn collect_widget_notifications(&mut self) {
        let count = self.grid.take_notifications();
        for _ in 0..count {
            self.queue.push_back(LoopEvent::WidgetSelection);
        }
    }
}

// ============================================================================
// DUAL TABLES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualEvent {
    SourceSelection,
    PickedSelection,
    StoreSelection,
    StoreRows,
}

/// DualSyncedTable - a source grid and a picked-rows grid over one store
///
/// The source grid shows every row; the picked grid shows exactly the
/// store's selection with every row ticked. Unticking a row in the picked
/// grid drops it from the selection, from the picked grid and from the
/// source grid's ticks. Each grid has its own mirror.
pub struct DualSyncedTable<T, S, P> {
    store: TableStore<T>,
    source: S,
    picked: P,
    source_mirror: SelectionMirror,
    picked_mirror: SelectionMirror,
    queue: VecDeque<DualEvent>,
}

impl<T, S, P> DualSyncedTable<T, S, P>
where
    T: Keyed + Clone,
    S: GridWidget<T>,
    P: GridWidget<T>,
{
    pub fn new(store: TableStore<T>, source: S, picked: P) -> Self {
        let mut table = DualSyncedTable {
            store,
            source,
            picked,
            source_mirror: SelectionMirror::new(),
            picked_mirror: SelectionMirror::new(),
            queue: VecDeque::new(),
        };
        table.queue.push_back(DualEvent::StoreRows);
        table.tick();
        table
    }

    pub fn store(&self) -> &TableStore<T> {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn picked(&self) -> &P {
        &self.picked
    }

    pub fn into_parts(self) -> (TableStore<T>, S, P) {
        (self.store, self.source, self.picked)
    }

    /// A user-side change in the source grid
    pub fn source_mut<R>(&mut self, f: impl FnOnce(&mut S) -> R) -> R {
        let out = f(&mut self.source);
        self.collect_notifications();
        out
    }

    /// A user-side change in the picked grid
    pub fn picked_mut<R>(&mut self, f: impl FnOnce(&mut P) -> R) -> R {
        let out = f(&mut self.picked);
        self.collect_notifications();
        out
    }

    /// A program-side change in the store
    pub fn store_mut<R>(&mut self, f: impl FnOnce(&mut TableStore<T>) -> R) -> R {
        let rows_rev = self.store.rows_revision();
        let sel_rev = self.store.selection_revision();

        let out = f(&mut self.store);

        if self.store.rows_revision() != rows_rev {
            self.queue.push_back(DualEvent::StoreRows);
        }
        if self.store.selection_revision() != sel_rev {
            self.queue.push_back(DualEvent::StoreSelection);
        }
        out
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Deliver every queued notification, then settle both mirrors
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        while let Some(event) = self.queue.pop_front() {
            report.delivered += 1;
            let action = match event {
                DualEvent::SourceSelection => {
                    self.source_mirror.widget_changed(&self.source, &mut self.store)
                }
                DualEvent::PickedSelection => {
                    self.picked_mirror.widget_changed(&self.picked, &mut self.store)
                }
                DualEvent::StoreRows => {
                    self.source.set_rows(self.store.all_rows().to_vec());
                    self.source_mirror.seen_revision = None;
                    self.picked_mirror.seen_revision = None;
                    SyncAction::Unchanged
                }
                DualEvent::StoreSelection => SyncAction::Unchanged,
            };

            report.record(action);
            if action != SyncAction::Ignored {
                self.push_store(&mut report);
            }
            self.collect_notifications();
        }

        self.source_mirror.settle();
        self.picked_mirror.settle();
        report
    }

    /// Keys ticked in the source grid
    pub fn source_keys(&self) -> HashSet<RowKey> {
        grid_keys(&self.source, self.store.id_field())
    }

    /// True when the source ticks match the selection and the picked grid shows it
    pub fn is_consistent(&self) -> bool {
        self.source_keys() == self.store.selected_keys() && self.picked_in_sync()
    }

    fn picked_in_sync(&self) -> bool {
        let id_field = self.store.id_field();
        let rows = self.picked.rows();
        let keys: HashSet<RowKey> = rows.iter().filter_map(|r| r.key(id_field)).collect();

        rows.len() == self.store.selected_count()
            && (0..rows.len()).all(|i| self.picked.is_selected(i))
            && keys == self.store.selected_keys()
    }

    /// Bring both grids up to the store's selection
    fn push_store(&mut self, report: &mut TickReport) {
        report.record(self.source_mirror.store_changed(&mut self.source, &self.store));

        if self.picked_mirror.seen_revision.is_none() || !self.picked_in_sync() {
            self.picked.set_rows(self.store.selected_rows().to_vec());
            self.picked_mirror.seen_revision = None;
            report.record(self.picked_mirror.store_changed(&mut self.picked, &self.store));
        }
    }

    fn collect_notifications(&mut self) {
        for _ in 0..self.source.take_notifications() {
            self.queue.push_back(DualEvent::SourceSelection);
        }
        for _ in 0..self.picked.take_notifications() {
            self.queue.push_back(DualEvent::PickedSelection);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_codec::parse_text;
    use crate::record::Record;

    fn table() -> SyncedTable<Record, MemoryGrid<Record>> {
        let mut store = TableStore::for_records();
        store.set_all_rows(parse_text("name\nAnn\nBo\nCy\nDi").unwrap());
        SyncedTable::new(store, MemoryGrid::default())
    }

    #[test]
    fn test_new_table_is_consistent_and_idle() {
        let t = table();
        assert_eq!(t.grid().len(), 4);
        assert!(t.is_consistent());
        assert_eq!(t.mirror().state(), SyncState::Idle);
    }

    #[test]
    fn test_widget_change_reaches_store() {
        let mut t = table();
        t.widget_mut(|g| g.toggle(1));
        let report = t.tick();

        assert_eq!(report.pushed_to_store, 1);
        assert_eq!(report.pushed_to_widget, 0);
        assert_eq!(t.store().selected_count(), 1);
        assert!(t.is_consistent());
    }

    #[test]
    fn test_store_change_reaches_widget_and_echo_is_ignored() {
        let mut t = table();
        t.store_mut(|s| s.select_all());
        let report = t.tick();

        assert_eq!(report.pushed_to_widget, 1);
        assert_eq!(report.pushed_to_store, 0);
        assert!(report.ignored >= 1);
        assert_eq!(t.grid().selected_count(), 4);
        assert!(t.is_consistent());
        assert_eq!(t.mirror().state(), SyncState::Idle);
    }

    #[test]
    fn test_state_stays_syncing_until_settle() {
        let mut store = TableStore::for_records();
        store.set_all_rows(parse_text("name\nAnn\nBo").unwrap());
        let mut grid = MemoryGrid::new(store.all_rows().to_vec());
        let mut mirror = SelectionMirror::new();

        store.select_all();
        assert_eq!(mirror.store_changed(&mut grid, &store), SyncAction::PushedToWidget);
        assert_eq!(mirror.state(), SyncState::SyncingFromStore);

        assert_eq!(mirror.widget_changed(&grid, &mut store), SyncAction::Ignored);
        mirror.settle();
        assert_eq!(mirror.state(), SyncState::Idle);
        assert_eq!(mirror.store_changed(&mut grid, &store), SyncAction::Unchanged);
    }

    #[test]
    fn test_widget_write_is_not_echoed_back() {
        let mut store = TableStore::for_records();
        store.set_all_rows(parse_text("name\nAnn\nBo").unwrap());
        let mut grid = MemoryGrid::new(store.all_rows().to_vec());
        let mut mirror = SelectionMirror::new();
        mirror.store_changed(&mut grid, &store);
        mirror.settle();

        grid.toggle(0);
        assert_eq!(mirror.widget_changed(&grid, &mut store), SyncAction::PushedToStore);
        assert_eq!(mirror.state(), SyncState::Idle);
        assert_eq!(mirror.store_changed(&mut grid, &store), SyncAction::Unchanged);
    }

    #[test]
    fn test_interleaved_changes_converge_in_one_tick() {
        let mut t = table();

        t.widget_mut(|g| g.toggle(0));
        t.store_mut(|s| {
            let row = s.all_rows()[3].clone();
            s.toggle_row_selection(&row);
        });
        t.widget_mut(|g| g.toggle(2));
        t.store_mut(|s| s.clear_selection());
        t.widget_mut(|g| g.toggle(1));

        let rows = t.store().total_count();
        let report = t.tick();

        assert!(t.is_consistent());
        assert_eq!(t.pending(), 0);
        assert!(report.cross_notifications() <= 5 * (rows + 1));
        assert_eq!(t.mirror().state(), SyncState::Idle);
    }

    #[test]
    fn test_store_first_then_widget_keeps_store_state() {
        let mut t = table();
        t.store_mut(|s| s.select_all());
        t.widget_mut(|g| g.toggle(0));
        t.tick();

        // the widget toggle was queued behind the store push and treated as its echo
        assert!(t.is_consistent());
        assert_eq!(t.store().selected_count(), 4);
    }

    #[test]
    fn test_widget_first_then_store_keeps_widget_state() {
        let mut t = table();
        t.widget_mut(|g| g.toggle(0));
        t.store_mut(|s| s.select_all());
        t.tick();

        assert!(t.is_consistent());
    }

    #[test]
    fn test_row_replacement_resyncs_widget() {
        let mut t = table();
        t.store_mut(|s| s.select_all());
        t.tick();

        t.store_mut(|s| s.add_rows(parse_text("name\nEd").unwrap()));
        t.tick();

        assert_eq!(t.grid().len(), 5);
        assert_eq!(t.grid().selected_count(), 4);
        assert!(t.is_consistent());

        t.store_mut(|s| s.remove_selected_rows());
        t.tick();
        assert_eq!(t.grid().len(), 1);
        assert_eq!(t.grid().selected_count(), 0);
        assert!(t.is_consistent());
    }

    #[test]
    fn test_repeated_ticks_are_quiet() {
        let mut t = table();
        t.widget_mut(|g| g.select_all());
        t.tick();

        let report = t.tick();
        assert_eq!(report, TickReport::default());
    }

    #[test]
    fn test_widget_toggle_then_row_replacement_converges() {
        let mut t = table();
        t.widget_mut(|g| g.toggle(0));
        t.store_mut(|s| s.set_all_rows(parse_text("name\nCy\nDi").unwrap()));
        t.tick();

        assert!(t.is_consistent());
        assert_eq!(t.store().selected_count(), 0);
        assert_eq!(t.grid().len(), 2);
        assert!(selection_within_rows(t.store()));
    }

    #[test]
    fn test_widget_selection_only_keeps_rows_the_store_holds() {
        let mut t = table();
        t.widget_mut(|g| {
            g.toggle(1);
            g.toggle(3);
        });
        t.store_mut(|s| s.add_rows(parse_text("name\nEd").unwrap()));
        t.tick();

        assert!(t.is_consistent());
        assert_eq!(t.store().selected_count(), 2);
        assert_eq!(t.grid().len(), 5);
    }

    // ------------------------------------------------------------------
    // interleavings
    // ------------------------------------------------------------------

    #[derive(Debug, Clone, Copy)]
    enum Op {
        WidgetToggleFirst,
        WidgetToggleLast,
        WidgetSelectAll,
        WidgetDeselectAll,
        PickedToggleFirst,
        PickedDeselectAll,
        StoreToggleFirst,
        StoreSelectAll,
        StoreClearSelection,
        StoreReplaceRows,
        StoreAddRows,
        StoreRemoveSelected,
        StoreClearAll,
    }

    const STORE_OPS: [Op; 7] = [
        Op::StoreToggleFirst,
        Op::StoreSelectAll,
        Op::StoreClearSelection,
        Op::StoreReplaceRows,
        Op::StoreAddRows,
        Op::StoreRemoveSelected,
        Op::StoreClearAll,
    ];

    fn single_ops() -> Vec<Op> {
        let mut ops = vec![
            Op::WidgetToggleFirst,
            Op::WidgetToggleLast,
            Op::WidgetSelectAll,
            Op::WidgetDeselectAll,
        ];
        ops.extend(STORE_OPS);
        ops
    }

    fn dual_ops() -> Vec<Op> {
        let mut ops = single_ops();
        ops.push(Op::PickedToggleFirst);
        ops.push(Op::PickedDeselectAll);
        ops
    }

    /// Every ordered sequence of `len` ops
    fn sequences(ops: &[Op], len: usize) -> Vec<Vec<Op>> {
        let mut out = vec![Vec::new()];
        for _ in 0..len {
            out = out
                .into_iter()
                .flat_map(|seq: Vec<Op>| {
                    ops.iter().map(move |op| {
                        let mut next = seq.clone();
                        next.push(*op);
                        next
                    })
                })
                .collect();
        }
        out
    }

    fn store_op(s: &mut TableStore<Record>, op: Op) {
        match op {
            Op::StoreToggleFirst => {
                if let Some(row) = s.all_rows().first().cloned() {
                    s.toggle_row_selection(&row);
                }
            }
            Op::StoreSelectAll => s.select_all(),
            Op::StoreClearSelection => s.clear_selection(),
            Op::StoreReplaceRows => s.set_all_rows(parse_text("name\nFay\nGus").unwrap()),
            Op::StoreAddRows => s.add_rows(parse_text("name\nHal").unwrap()),
            Op::StoreRemoveSelected => {
                s.remove_selected_rows();
            }
            Op::StoreClearAll => s.clear_all_data(),
            _ => {}
        }
    }

    fn grid_op(g: &mut MemoryGrid<Record>, op: Op) {
        match op {
            Op::WidgetToggleFirst | Op::PickedToggleFirst => g.toggle(0),
            Op::WidgetToggleLast => g.toggle(g.len().saturating_sub(1)),
            Op::WidgetSelectAll => g.select_all(),
            Op::WidgetDeselectAll | Op::PickedDeselectAll => g.deselect_all(),
            _ => {}
        }
    }

    fn apply(t: &mut SyncedTable<Record, MemoryGrid<Record>>, op: Op) {
        match op {
            Op::WidgetToggleFirst
            | Op::WidgetToggleLast
            | Op::WidgetSelectAll
            | Op::WidgetDeselectAll => t.widget_mut(|g| grid_op(g, op)),
            _ => t.store_mut(|s| store_op(s, op)),
        }
    }

    fn selection_within_rows(store: &TableStore<Record>) -> bool {
        let all: HashSet<RowKey> = store
            .all_rows()
            .iter()
            .filter_map(|r| r.key(store.id_field()))
            .collect();
        store.selected_keys().is_subset(&all)
    }

    #[test]
    fn test_every_interleaving_converges_in_one_tick() {
        let ops = single_ops();
        for len in 1..=3 {
            for seq in sequences(&ops, len) {
                for preselect in [false, true] {
                    let mut t = table();
                    if preselect {
                        t.widget_mut(|g| {
                            g.toggle(0);
                            g.toggle(2);
                        });
                        t.tick();
                    }
                    for op in &seq {
                        apply(&mut t, *op);
                    }

                    let pending = t.pending();
                    let report = t.tick();

                    assert!(t.is_consistent(), "{:?} preselect={}", seq, preselect);
                    assert!(selection_within_rows(t.store()), "{:?}", seq);
                    assert!(report.cross_notifications() <= pending, "{:?}: {:?}", seq, report);
                    assert_eq!(t.pending(), 0);
                    assert_eq!(t.mirror().state(), SyncState::Idle);
                    assert_eq!(t.tick().cross_notifications(), 0, "{:?}", seq);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // dual tables
    // ------------------------------------------------------------------

    type Dual = DualSyncedTable<Record, MemoryGrid<Record>, MemoryGrid<Record>>;

    fn dual() -> Dual {
        let mut store = TableStore::for_records();
        store.set_all_rows(parse_text("name\nAnn\nBo\nCy\nDi").unwrap());
        DualSyncedTable::new(store, MemoryGrid::default(), MemoryGrid::default())
    }

    fn apply_dual(t: &mut Dual, op: Op) {
        match op {
            Op::WidgetToggleFirst
            | Op::WidgetToggleLast
            | Op::WidgetSelectAll
            | Op::WidgetDeselectAll => t.source_mut(|g| grid_op(g, op)),
            Op::PickedToggleFirst | Op::PickedDeselectAll => t.picked_mut(|g| grid_op(g, op)),
            _ => t.store_mut(|s| store_op(s, op)),
        }
    }

    #[test]
    fn test_dual_new_table_has_empty_picked_grid() {
        let t = dual();
        assert_eq!(t.source().len(), 4);
        assert!(t.picked().is_empty());
        assert_eq!(t.pending(), 0);
        assert!(t.is_consistent());
    }

    #[test]
    fn test_dual_source_selection_fills_picked_grid() {
        let mut t = dual();
        t.source_mut(|g| {
            g.toggle(0);
            g.toggle(2);
        });
        t.tick();

        assert_eq!(t.store().selected_count(), 2);
        assert_eq!(t.picked().len(), 2);
        assert_eq!(t.picked().selected_count(), 2);
        assert!(t.is_consistent());
    }

    #[test]
    fn test_dual_picked_deselect_reaches_source_in_one_tick() {
        let mut t = dual();
        t.source_mut(|g| {
            g.toggle(0);
            g.toggle(2);
        });
        t.tick();

        t.picked_mut(|g| g.toggle(0));
        t.tick();

        assert!(t.is_consistent());
        assert_eq!(t.store().selected_count(), 1);
        assert_eq!(t.picked().len(), 1);
        assert!(!t.source().is_selected(0));
        assert!(t.source().is_selected(2));
        assert_eq!(t.tick(), TickReport::default());
    }

    #[test]
    fn test_dual_store_selection_reaches_both_grids() {
        let mut t = dual();
        t.store_mut(|s| s.select_all());
        t.tick();

        assert_eq!(t.source().selected_count(), 4);
        assert_eq!(t.picked().len(), 4);
        assert!(t.is_consistent());

        t.store_mut(|s| s.clear_selection());
        t.tick();
        assert_eq!(t.source().selected_count(), 0);
        assert!(t.picked().is_empty());
    }

    #[test]
    fn test_dual_row_replacement_clears_both_grids() {
        let mut t = dual();
        t.source_mut(|g| g.toggle(1));
        t.tick();

        t.store_mut(|s| s.set_all_rows(parse_text("name\nCy\nDi").unwrap()));
        t.tick();

        assert_eq!(t.source().len(), 2);
        assert!(t.picked().is_empty());
        assert!(t.is_consistent());
    }

    #[test]
    fn test_dual_every_interleaving_converges_in_one_tick() {
        let ops = dual_ops();
        for len in 1..=3 {
            for seq in sequences(&ops, len) {
                let mut t = dual();
                t.source_mut(|g| {
                    g.toggle(0);
                    g.toggle(2);
                });
                t.tick();
                for op in &seq {
                    apply_dual(&mut t, *op);
                }

                let pending = t.pending();
                let report = t.tick();

                assert!(t.is_consistent(), "{:?}", seq);
                assert!(selection_within_rows(t.store()), "{:?}", seq);
                // each delivered change reaches the store and both grids at most once
                assert!(report.cross_notifications() <= 3 * pending, "{:?}: {:?}", seq, report);
                assert_eq!(t.pending(), 0);
                assert_eq!(t.tick().cross_notifications(), 0, "{:?}", seq);
            }
        }
    }
}
