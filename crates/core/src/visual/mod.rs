use crate::{Carrier, PlayPosition, WindowConfig};

/// Callback surface a realized carrier drives on its concrete visual.
///
/// The window calls [`VisualBinding::init_visual`] exactly once per
/// realization, [`VisualBinding::update_visual`] zero or more times while the
/// carrier stays realized, and [`VisualBinding::finish_visual`] exactly once
/// when it is virtualized. Instances are recycled, so `init_visual` must reset
/// whatever state a previous carrier left behind.
pub trait VisualBinding {
    /// Called when the instance is bound to `carrier`.
    fn init_visual(&mut self, carrier: &Carrier, layer: &LayerView);

    /// Called once per tick while bound.
    fn update_visual(&mut self, carrier: &Carrier, layer: &LayerView);

    /// Called when the instance is unbound, right before it returns to its pool.
    fn finish_visual(&mut self);

    /// Requests virtualization regardless of the display and judge windows.
    fn is_visual_finished(&self) -> bool;

    /// Keeps the instance alive outside both windows (e.g. while a hit
    /// animation plays out). [`VisualBinding::is_visual_finished`] then becomes
    /// the only way for it to leave.
    fn ignore_display_window(&self) -> bool;
}

/// Produces fresh instances for one category's pool.
pub trait VisualFactory {
    fn instantiate(&mut self) -> Box<dyn VisualBinding>;

    /// Permanently disposes of an instance the pool no longer keeps.
    fn destroy(&mut self, visual: Box<dyn VisualBinding>) {
        drop(visual);
    }
}

/// Read-only snapshot of the window state passed to bindings each call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerView {
    pub position: PlayPosition,
    pub window: WindowConfig,
}

impl LayerView {
    pub fn new(position: PlayPosition, window: WindowConfig) -> Self {
        Self { position, window }
    }

    /// Delta roll of one carrier edge after the global speed scale, optionally
    /// clamped to the display window.
    pub fn delta_roll(&self, carrier: &Carrier, use_start: bool, clamp_to_window: bool) -> f64 {
        let delta = carrier.scaled_delta_roll(self.position.display_position, use_start)
            * self.window.speed_scale;
        if clamp_to_window {
            delta.clamp(self.window.display_window_down, self.window.display_window_up)
        } else {
            delta
        }
    }

    /// Maps a delta roll onto the upper display window, `1.0` being its far edge.
    pub fn delta_roll_to_ratio(&self, delta_roll: f64) -> f32 {
        if self.window.display_window_up == 0.0 {
            return 0.0;
        }
        (delta_roll / self.window.display_window_up) as f32
    }

    pub fn ratio(&self, carrier: &Carrier, use_start: bool, clamp_to_window: bool) -> f32 {
        self.delta_roll_to_ratio(self.delta_roll(carrier, use_start, clamp_to_window))
    }
}
