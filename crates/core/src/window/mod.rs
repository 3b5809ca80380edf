//! Tick-driven realization of carriers against pooled visuals.
//!
//! Three [`PointerList`]s index the loaded carriers: by the play position at
//! which each crosses the upper display boundary, by the position at which it
//! crosses the lower display boundary, and by start time. Every tick the
//! cursors are advanced (or walked back on rewind) past the carriers whose
//! boundary the play position crossed, and each crossed carrier is realized if
//! it is in range. Only crossed carriers are tested, so a tick costs the
//! number of boundary crossings plus the number of realized entries, not the
//! size of the timeline.

use std::{collections::HashMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::{
    Carrier, CarrierId, Category, DebugConfig, LayerConfig, LayerView, ObjectPool, PlayPosition,
    PointerList, PoolConfig, Result, VisualBinding, VisualFactory, WindowConfig, WindowError,
};

/// Widens both display window edges slightly so a carrier sitting exactly on a
/// boundary does not flicker between realized and virtual.
const EPSILON_K: f64 = 1.000001;

/// Visual factory and sizing for one category, handed to
/// [`RealizationWindow::load`].
pub struct PoolSetup {
    pub category: Category,
    pub factory: Box<dyn VisualFactory>,
    pub config: PoolConfig,
}

impl PoolSetup {
    pub fn new(category: Category, factory: Box<dyn VisualFactory>, config: PoolConfig) -> Self {
        Self {
            category,
            factory,
            config,
        }
    }
}

impl fmt::Debug for PoolSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolSetup")
            .field("category", &self.category)
            .field("config", &self.config)
            .finish()
    }
}

/// What happened during one [`RealizationWindow::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub realized: usize,
    pub virtualized: usize,
    /// Realizations postponed because a pool ran out of budget.
    pub deferred: usize,
    /// Previously deferred carriers attempted again this tick.
    pub retried: usize,
    pub over_budget_pools: usize,
}

/// Counters accumulated since the last load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowDiagnostics {
    pub ticks: u64,
    /// Ticks on which at least one pool refused an instantiation.
    pub over_budget_ticks: u64,
    pub deferred_realizations: u64,
    pub total_realizations: u64,
    pub total_virtualizations: u64,
    /// Carriers left out at load because no pool serves their category.
    pub excluded_carriers: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub loaded: usize,
    pub excluded: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Virtual,
    /// Waiting in the deferred queue for pool budget.
    Deferred,
    /// Index into the realized set.
    Realized(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Up,
    Down,
}

struct RealizedEntry {
    carrier: CarrierId,
    visual: Box<dyn VisualBinding>,
}

/// Keeps the set of realized carriers in sync with a moving play position.
pub struct RealizationWindow {
    config: WindowConfig,
    debug: DebugConfig,
    carriers: Arc<[Carrier]>,
    pools: HashMap<Category, ObjectPool>,
    up_roll: PointerList<CarrierId>,
    down_roll: PointerList<CarrierId>,
    start_time: PointerList<CarrierId>,
    realized: Vec<RealizedEntry>,
    slots: Vec<SlotState>,
    deferred: Vec<CarrierId>,
    retry_buffer: Vec<CarrierId>,
    position: PlayPosition,
    last_position: PlayPosition,
    rescan_pending: bool,
    loaded: bool,
    diagnostics: WindowDiagnostics,
}

impl RealizationWindow {
    pub fn new(config: WindowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            debug: DebugConfig::default(),
            carriers: empty_arena(),
            pools: HashMap::new(),
            up_roll: PointerList::default(),
            down_roll: PointerList::default(),
            start_time: PointerList::default(),
            realized: Vec::new(),
            slots: Vec::new(),
            deferred: Vec::new(),
            retry_buffer: Vec::new(),
            position: PlayPosition::default(),
            last_position: unplayed_position(),
            rescan_pending: false,
            loaded: false,
            diagnostics: WindowDiagnostics::default(),
        })
    }

    pub fn from_layer_config(config: &LayerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.window)?.with_debug(config.debug))
    }

    pub fn with_debug(mut self, debug: DebugConfig) -> Self {
        self.debug = debug;
        self
    }

    /// Indexes `carriers` and builds one pool per [`PoolSetup`].
    ///
    /// The carriers stay shared with whoever produced them and must not change
    /// while loaded. Carriers whose category has no pool, or that fail
    /// [`Carrier::validate`], are left out entirely.
    /// A window that is already loaded is unloaded first.
    pub fn load(&mut self, carriers: Arc<[Carrier]>, pools: Vec<PoolSetup>) -> Result<LoadSummary> {
        if self.loaded {
            self.unload();
        }
        if u32::try_from(carriers.len()).is_err() {
            return Err(WindowError::msg("too many carriers for one window"));
        }

        let mut pool_map = HashMap::with_capacity(pools.len());
        for setup in pools {
            if pool_map.contains_key(&setup.category) {
                return Err(WindowError::config(format!(
                    "category {} has more than one pool",
                    setup.category
                )));
            }
            let pool = ObjectPool::new(setup.category, setup.factory, setup.config)
                .with_destroy_without_recycling(self.debug.destroy_without_recycling);
            pool_map.insert(setup.category, pool);
        }

        let mut selected = Vec::with_capacity(carriers.len());
        let mut excluded: HashMap<Category, usize> = HashMap::new();
        let mut per_category: HashMap<Category, usize> = HashMap::new();
        let mut invalid = 0;
        for (index, carrier) in carriers.iter().enumerate() {
            if let Err(err) = carrier.validate(index) {
                warn!(%err, "invalid carrier excluded");
                invalid += 1;
            } else if pool_map.contains_key(&carrier.category) {
                selected.push(CarrierId(index as u32));
                *per_category.entry(carrier.category).or_default() += 1;
            } else {
                *excluded.entry(carrier.category).or_default() += 1;
            }
        }
        for (category, count) in &excluded {
            warn!(%category, count, "no pool for category, carriers excluded");
        }
        let excluded_total = excluded.values().sum::<usize>() + invalid;

        self.slots = vec![SlotState::Virtual; carriers.len()];
        self.carriers = carriers;
        self.pools = pool_map;
        self.up_roll = PointerList::new(selected.clone());
        self.down_roll = PointerList::new(selected.clone());
        self.start_time = PointerList::new(selected);
        self.sort_roll_lists();
        let carriers = &self.carriers;
        self.start_time
            .sort_by_key_f64(|id| carriers[id.index()].start_time());

        for pool in self.pools.values_mut() {
            let count = if self.debug.prebuffer_all_at_once {
                per_category.get(&pool.category()).copied().unwrap_or(0)
            } else {
                pool.config().buffered_idle_target
            };
            pool.refill_to_target(Some(count));
        }

        self.realized.clear();
        self.deferred.clear();
        self.position = PlayPosition::default();
        self.last_position = unplayed_position();
        self.rescan_pending = false;
        self.diagnostics = WindowDiagnostics {
            excluded_carriers: excluded_total,
            ..WindowDiagnostics::default()
        };
        self.loaded = true;

        let summary = LoadSummary {
            loaded: self.start_time.len(),
            excluded: excluded_total,
        };
        info!(
            loaded = summary.loaded,
            excluded = summary.excluded,
            pools = self.pools.len(),
            "realization window loaded"
        );
        Ok(summary)
    }

    /// Virtualizes every realized carrier regardless of range and drops the
    /// lists and pools. Returns how many carriers were virtualized.
    pub fn unload(&mut self) -> usize {
        if !self.loaded {
            return 0;
        }

        let realized = std::mem::take(&mut self.realized);
        let count = realized.len();
        for RealizedEntry {
            carrier,
            mut visual,
        } in realized
        {
            visual.finish_visual();
            let category = self.carriers[carrier.index()].category;
            if let Some(pool) = self.pools.get_mut(&category) {
                pool.release(visual);
            }
        }

        self.diagnostics.total_virtualizations += count as u64;
        self.pools.clear();
        self.up_roll = PointerList::default();
        self.down_roll = PointerList::default();
        self.start_time = PointerList::default();
        self.slots.clear();
        self.deferred.clear();
        self.retry_buffer.clear();
        self.carriers = empty_arena();
        self.loaded = false;

        info!(virtualized = count, "realization window unloaded");
        count
    }

    /// Advances the window to `position`.
    ///
    /// Order within a tick: pool refill, deferred retries, cursor traversal,
    /// visual updates, virtualization sweep.
    pub fn tick(&mut self, position: PlayPosition) -> TickReport {
        let mut report = TickReport::default();
        if !self.loaded {
            return report;
        }
        self.diagnostics.ticks += 1;

        for pool in self.pools.values_mut() {
            pool.begin_tick();
            pool.refill_to_target(None);
        }

        self.position = position;
        self.retry_deferred(&mut report);

        if self.rescan_pending {
            self.rescan_pending = false;
            for index in 0..self.start_time.len() {
                let id = self.start_time.as_slice()[index];
                self.realize_if_in_range(id, &mut report);
            }
        }

        if position.display_position >= self.last_position.display_position {
            self.advance_roll_forward(Boundary::Down, &mut report);
            self.advance_roll_forward(Boundary::Up, &mut report);
        } else {
            self.advance_roll_backward(Boundary::Up, &mut report);
            self.advance_roll_backward(Boundary::Down, &mut report);
        }

        if position.judge_time < self.last_position.judge_time {
            self.rewind_time_cursor();
        }
        self.advance_time_forward(&mut report);

        self.last_position = position;

        let view = LayerView::new(self.position, self.config);
        for entry in &mut self.realized {
            let carrier = &self.carriers[entry.carrier.index()];
            entry.visual.update_visual(carrier, &view);
        }

        self.sweep(&mut report);
        self.report_budget(&mut report);
        report
    }

    /// Changes the global speed scale and re-sorts the roll lists.
    pub fn set_speed_scale(&mut self, speed_scale: f64) -> Result<()> {
        let config = WindowConfig {
            speed_scale,
            ..self.config
        };
        self.set_window_config(config)
    }

    /// Replaces the window configuration.
    ///
    /// Roll lists are re-sorted and every cursor is re-seated against the last
    /// observed position; carriers the new windows cover are picked up on the
    /// next tick.
    pub fn set_window_config(&mut self, config: WindowConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        if !self.loaded {
            return Ok(());
        }

        self.sort_roll_lists();
        let carriers = &self.carriers;
        let display = self.last_position.display_position;
        let up = config.scaled_display_up();
        let down = config.scaled_display_down();
        self.up_roll
            .seek_partition(|id| carriers[id.index()].target_roll(up, true) <= display);
        self.down_roll
            .seek_partition(|id| carriers[id.index()].target_roll(down, false) <= display);
        let judge = self.last_position.judge_time;
        self.start_time.seek_partition(|id| {
            carriers[id.index()].start_time() - config.judge_window_up <= judge
        });
        self.rescan_pending = true;
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn config(&self) -> WindowConfig {
        self.config
    }

    pub fn debug_config(&self) -> DebugConfig {
        self.debug
    }

    /// Position passed to the most recent tick.
    pub fn position(&self) -> PlayPosition {
        self.position
    }

    pub fn view(&self) -> LayerView {
        LayerView::new(self.position, self.config)
    }

    pub fn diagnostics(&self) -> WindowDiagnostics {
        self.diagnostics
    }

    pub fn carriers(&self) -> &Arc<[Carrier]> {
        &self.carriers
    }

    pub fn carrier(&self, id: CarrierId) -> Option<&Carrier> {
        self.carriers.get(id.index())
    }

    pub fn pool(&self, category: Category) -> Option<&ObjectPool> {
        self.pools.get(&category)
    }

    /// Carriers that made it into the lists at load.
    pub fn tracked_count(&self) -> usize {
        self.start_time.len()
    }

    pub fn realized_count(&self) -> usize {
        self.realized.len()
    }

    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    pub fn is_realized(&self, id: CarrierId) -> bool {
        matches!(self.slots.get(id.index()), Some(SlotState::Realized(_)))
    }

    /// Realized carriers in set order. The order changes as entries are removed.
    pub fn realized_carriers(&self) -> impl Iterator<Item = CarrierId> + '_ {
        self.realized.iter().map(|entry| entry.carrier)
    }

    pub fn find_visual(&self, id: CarrierId) -> Option<&dyn VisualBinding> {
        match self.slots.get(id.index())? {
            SlotState::Realized(index) => Some(self.realized[*index].visual.as_ref()),
            _ => None,
        }
    }

    pub fn find_visual_mut(&mut self, id: CarrierId) -> Option<&mut (dyn VisualBinding + 'static)> {
        match self.slots.get(id.index())? {
            SlotState::Realized(index) => Some(self.realized[*index].visual.as_mut()),
            _ => None,
        }
    }

    /// Whether `id` overlaps the judge window or the display window at the
    /// position of the most recent tick.
    pub fn is_carrier_in_range(&self, id: CarrierId) -> bool {
        let Some(carrier) = self.carriers.get(id.index()) else {
            return false;
        };
        let position = self.position;
        let config = &self.config;

        let in_judge_window = carrier.start_time() <= position.judge_time + config.judge_window_up
            && carrier.end_time() >= position.judge_time + config.judge_window_down;
        let in_display_window = carrier.scaled_delta_roll(position.display_position, true)
            <= config.scaled_display_up() * EPSILON_K
            && carrier.scaled_delta_roll(position.display_position, false)
                >= config.scaled_display_down() * EPSILON_K;

        in_judge_window || in_display_window
    }

    fn sort_roll_lists(&mut self) {
        let carriers = &self.carriers;
        let up = self.config.scaled_display_up();
        let down = self.config.scaled_display_down();
        self.up_roll
            .sort_by_key_f64(|id| carriers[id.index()].target_roll(up, true));
        self.down_roll
            .sort_by_key_f64(|id| carriers[id.index()].target_roll(down, false));
    }

    /// Play position at which `id` crosses the given display boundary.
    fn boundary_roll(&self, boundary: Boundary, id: CarrierId) -> f64 {
        let carrier = &self.carriers[id.index()];
        match boundary {
            Boundary::Up => carrier.target_roll(self.config.scaled_display_up(), true),
            Boundary::Down => carrier.target_roll(self.config.scaled_display_down(), false),
        }
    }

    fn roll_list(&mut self, boundary: Boundary) -> &mut PointerList<CarrierId> {
        match boundary {
            Boundary::Up => &mut self.up_roll,
            Boundary::Down => &mut self.down_roll,
        }
    }

    fn advance_roll_forward(&mut self, boundary: Boundary, report: &mut TickReport) {
        let display = self.position.display_position;
        while let Some(id) = self.roll_list(boundary).try_get() {
            if self.boundary_roll(boundary, id) > display {
                break;
            }
            self.realize_if_in_range(id, report);
            self.roll_list(boundary).skip_to_next();
        }
    }

    fn advance_roll_backward(&mut self, boundary: Boundary, report: &mut TickReport) {
        let display = self.position.display_position;
        while let Some(id) = self.roll_list(boundary).try_peek_last() {
            if self.boundary_roll(boundary, id) < display {
                break;
            }
            self.realize_if_in_range(id, report);
            self.roll_list(boundary).skip_to_last();
        }
    }

    fn advance_time_forward(&mut self, report: &mut TickReport) {
        let judge_time = self.position.judge_time;
        while let Some(id) = self.start_time.try_get() {
            if self.carriers[id.index()].start_time() - self.config.judge_window_up > judge_time {
                break;
            }
            self.realize_if_in_range(id, report);
            self.start_time.skip_to_next();
        }
    }

    /// Walks the time cursor back over carriers whose judge window now lies
    /// ahead again. Moving backward only takes carriers out of the judge
    /// window, so nothing is realized here.
    fn rewind_time_cursor(&mut self) {
        let judge_time = self.position.judge_time;
        while let Some(id) = self.start_time.try_peek_last() {
            if self.carriers[id.index()].start_time() - self.config.judge_window_up <= judge_time {
                break;
            }
            self.start_time.skip_to_last();
        }
    }

    fn retry_deferred(&mut self, report: &mut TickReport) {
        if self.deferred.is_empty() {
            return;
        }
        std::mem::swap(&mut self.deferred, &mut self.retry_buffer);
        for index in 0..self.retry_buffer.len() {
            let id = self.retry_buffer[index];
            self.slots[id.index()] = SlotState::Virtual;
            report.retried += 1;
            self.realize_if_in_range(id, report);
        }
        self.retry_buffer.clear();
    }

    fn realize_if_in_range(&mut self, id: CarrierId, report: &mut TickReport) {
        if self.slots[id.index()] != SlotState::Virtual || !self.is_carrier_in_range(id) {
            return;
        }
        self.realize(id, report);
    }

    fn realize(&mut self, id: CarrierId, report: &mut TickReport) {
        debug_assert!(!self.is_realized(id), "carrier {id:?} is already realized");

        let carrier = &self.carriers[id.index()];
        let Some(pool) = self.pools.get_mut(&carrier.category) else {
            debug_assert!(false, "carrier {id:?} has no pool");
            return;
        };

        let Some(mut visual) = pool.acquire() else {
            self.slots[id.index()] = SlotState::Deferred;
            self.deferred.push(id);
            report.deferred += 1;
            self.diagnostics.deferred_realizations += 1;
            return;
        };

        let view = LayerView::new(self.position, self.config);
        visual.init_visual(carrier, &view);
        if visual.is_visual_finished() {
            visual.finish_visual();
            pool.release(visual);
            return;
        }

        if self.debug.log_realization {
            trace!(
                start_roll = carrier.start_roll(),
                end_roll = carrier.end_roll(),
                display_position = self.position.display_position,
                delta_start = carrier.scaled_delta_roll(self.position.display_position, true),
                delta_end = carrier.scaled_delta_roll(self.position.display_position, false),
                "realize"
            );
        }

        self.slots[id.index()] = SlotState::Realized(self.realized.len());
        self.realized.push(RealizedEntry { carrier: id, visual });
        report.realized += 1;
        self.diagnostics.total_realizations += 1;
    }

    fn sweep(&mut self, report: &mut TickReport) {
        let mut index = 0;
        while index < self.realized.len() {
            let entry = &self.realized[index];
            let finished = entry.visual.is_visual_finished();
            let out_of_range =
                !entry.visual.ignore_display_window() && !self.is_carrier_in_range(entry.carrier);
            if finished || out_of_range {
                self.virtualize_at(index, report);
            } else {
                index += 1;
            }
        }
    }

    fn virtualize_at(&mut self, index: usize, report: &mut TickReport) {
        let RealizedEntry {
            carrier: id,
            mut visual,
        } = self.realized.swap_remove(index);
        if let Some(moved) = self.realized.get(index) {
            self.slots[moved.carrier.index()] = SlotState::Realized(index);
        }
        debug_assert!(self.is_realized(id), "carrier {id:?} is not realized");
        self.slots[id.index()] = SlotState::Virtual;

        visual.finish_visual();
        let carrier = &self.carriers[id.index()];
        if let Some(pool) = self.pools.get_mut(&carrier.category) {
            pool.release(visual);
        }

        if self.debug.log_realization {
            trace!(
                start_roll = carrier.start_roll(),
                end_roll = carrier.end_roll(),
                display_position = self.position.display_position,
                "virtualize"
            );
        }

        report.virtualized += 1;
        self.diagnostics.total_virtualizations += 1;
    }

    fn report_budget(&mut self, report: &mut TickReport) {
        for pool in self.pools.values() {
            if pool.is_over_budget_this_tick() {
                report.over_budget_pools += 1;
                debug!(
                    category = %pool.category(),
                    budget = pool.config().max_instantiations_per_tick,
                    instantiated = pool.instantiated_this_tick(),
                    denied = pool.denied_this_tick(),
                    "pool ran out of instantiation budget this tick"
                );
            }
        }
        if report.over_budget_pools > 0 {
            self.diagnostics.over_budget_ticks += 1;
        }
    }
}

fn empty_arena() -> Arc<[Carrier]> {
    Arc::from(Vec::<Carrier>::new())
}

fn unplayed_position() -> PlayPosition {
    PlayPosition::new(f64::NEG_INFINITY, f64::NEG_INFINITY)
}

impl Drop for RealizationWindow {
    fn drop(&mut self) {
        self.unload();
    }
}

impl fmt::Debug for RealizationWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealizationWindow")
            .field("config", &self.config)
            .field("loaded", &self.loaded)
            .field("carriers", &self.carriers.len())
            .field("tracked", &self.start_time.len())
            .field("realized", &self.realized.len())
            .field("deferred", &self.deferred.len())
            .field("position", &self.position)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

#[cfg(test)]
mod tests;
