use std::fmt;

use crate::{Category, PoolConfig, VisualBinding, VisualFactory};

/// Idle-instance stack for one category with a per-tick instantiation budget.
///
/// Running out of budget is never an error: [`ObjectPool::acquire`] returns
/// `None` and the caller retries on a later tick.
pub struct ObjectPool {
    category: Category,
    factory: Box<dyn VisualFactory>,
    config: PoolConfig,
    idle: Vec<Box<dyn VisualBinding>>,
    destroy_without_recycling: bool,
    instantiated_this_tick: usize,
    denied_this_tick: usize,
}

impl ObjectPool {
    pub fn new(category: Category, factory: Box<dyn VisualFactory>, config: PoolConfig) -> Self {
        Self {
            category,
            factory,
            config,
            idle: Vec::with_capacity(config.buffered_idle_target),
            destroy_without_recycling: false,
            instantiated_this_tick: 0,
            denied_this_tick: 0,
        }
    }

    /// Destroys released instances instead of keeping them for reuse.
    pub fn with_destroy_without_recycling(mut self, enabled: bool) -> Self {
        self.destroy_without_recycling = enabled;
        self
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn instantiated_this_tick(&self) -> usize {
        self.instantiated_this_tick
    }

    /// Acquisitions refused this tick because the budget was spent.
    pub fn denied_this_tick(&self) -> usize {
        self.denied_this_tick
    }

    pub fn can_instantiate_this_tick(&self) -> bool {
        self.instantiated_this_tick < self.config.max_instantiations_per_tick
    }

    /// True when demand this tick exceeded what the budget allowed.
    pub fn is_over_budget_this_tick(&self) -> bool {
        self.denied_this_tick > 0
    }

    /// Resets the per-tick counters.
    pub fn begin_tick(&mut self) {
        self.instantiated_this_tick = 0;
        self.denied_this_tick = 0;
    }

    /// Pops an idle instance, or creates one if the tick budget allows it.
    pub fn acquire(&mut self) -> Option<Box<dyn VisualBinding>> {
        if let Some(visual) = self.idle.pop() {
            return Some(visual);
        }
        if self.can_instantiate_this_tick() {
            return Some(self.instantiate());
        }
        self.denied_this_tick += 1;
        None
    }

    pub fn release(&mut self, visual: Box<dyn VisualBinding>) {
        if self.destroy_without_recycling {
            self.factory.destroy(visual);
            return;
        }
        self.idle.push(visual);
    }

    /// Tops the idle stack up.
    ///
    /// With `None` the stack grows towards `buffered_idle_target` but stops when
    /// this tick's budget is spent. With `Some(count)` it grows to `count`
    /// ignoring the budget; that bulk mode is meant for pre-buffering before
    /// play starts. Returns whether the requested size was reached.
    pub fn refill_to_target(&mut self, override_count: Option<usize>) -> bool {
        match override_count {
            Some(count) => {
                while self.idle.len() < count {
                    let visual = self.factory.instantiate();
                    self.idle.push(visual);
                }
                true
            }
            None => {
                while self.idle.len() < self.config.buffered_idle_target {
                    if !self.can_instantiate_this_tick() {
                        return false;
                    }
                    let visual = self.instantiate();
                    self.idle.push(visual);
                }
                true
            }
        }
    }

    /// Destroys every idle instance through the factory.
    pub fn clear(&mut self) {
        for visual in self.idle.drain(..) {
            self.factory.destroy(visual);
        }
    }

    fn instantiate(&mut self) -> Box<dyn VisualBinding> {
        self.instantiated_this_tick += 1;
        self.factory.instantiate()
    }
}

impl Drop for ObjectPool {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for ObjectPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("category", &self.category)
            .field("config", &self.config)
            .field("idle", &self.idle.len())
            .field("destroy_without_recycling", &self.destroy_without_recycling)
            .field("instantiated_this_tick", &self.instantiated_this_tick)
            .field("denied_this_tick", &self.denied_this_tick)
            .finish()
    }
}
