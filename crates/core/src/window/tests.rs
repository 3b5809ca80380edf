use std::{cell::RefCell, rc::Rc, sync::Arc};

use super::*;
use crate::CarrierTiming;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Init { instance: usize, roll: f64 },
    Update { instance: usize },
    Finish { instance: usize },
}

#[derive(Default)]
struct Script {
    events: Vec<Event>,
    created: usize,
    destroyed: usize,
    finish_on_init: bool,
    finish_all: bool,
    ignore_window: bool,
}

type Shared = Rc<RefCell<Script>>;

struct Recorder {
    instance: usize,
    script: Shared,
    bound: bool,
}

impl VisualBinding for Recorder {
    fn init_visual(&mut self, carrier: &Carrier, _layer: &LayerView) {
        assert!(!self.bound, "instance {} bound twice", self.instance);
        self.bound = true;
        self.script.borrow_mut().events.push(Event::Init {
            instance: self.instance,
            roll: carrier.start_roll(),
        });
    }

    fn update_visual(&mut self, _carrier: &Carrier, _layer: &LayerView) {
        assert!(self.bound);
        self.script.borrow_mut().events.push(Event::Update {
            instance: self.instance,
        });
    }

    fn finish_visual(&mut self) {
        assert!(self.bound, "instance {} finished while unbound", self.instance);
        self.bound = false;
        self.script.borrow_mut().events.push(Event::Finish {
            instance: self.instance,
        });
    }

    fn is_visual_finished(&self) -> bool {
        let script = self.script.borrow();
        script.finish_on_init || script.finish_all
    }

    fn ignore_display_window(&self) -> bool {
        self.script.borrow().ignore_window
    }
}

struct RecorderFactory(Shared);

impl VisualFactory for RecorderFactory {
    fn instantiate(&mut self) -> Box<dyn VisualBinding> {
        let mut script = self.0.borrow_mut();
        script.created += 1;
        Box::new(Recorder {
            instance: script.created,
            script: self.0.clone(),
            bound: false,
        })
    }

    fn destroy(&mut self, visual: Box<dyn VisualBinding>) {
        self.0.borrow_mut().destroyed += 1;
        drop(visual);
    }
}

fn window_config() -> WindowConfig {
    WindowConfig {
        display_window_up: 2.0,
        display_window_down: -0.5,
        judge_window_up: 0.5,
        judge_window_down: -0.5,
        speed_scale: 1.0,
    }
}

fn roomy_pool() -> PoolConfig {
    PoolConfig {
        buffered_idle_target: 4,
        max_instantiations_per_tick: 4,
    }
}

/// Carrier driven by roll only; its times sit far outside any judge window used here.
fn roll_carrier(start: f64, end: f64) -> Carrier {
    Carrier::new(
        CarrierTiming::new(1000.0 + start, None, start),
        CarrierTiming::new(1000.0 + end, None, end),
        Category(0),
    )
}

/// Carrier driven by judge time only; its roll sits far off screen.
fn timed_carrier(start_time: f64, end_time: f64) -> Carrier {
    Carrier::new(
        CarrierTiming::new(start_time, None, 1000.0),
        CarrierTiming::new(end_time, None, 1000.0),
        Category(0),
    )
}

fn pool_setup(script: &Shared, pool: PoolConfig) -> PoolSetup {
    PoolSetup::new(Category(0), Box::new(RecorderFactory(script.clone())), pool)
}

fn load_with(
    carriers: Vec<Carrier>,
    pool: PoolConfig,
    debug: DebugConfig,
) -> (RealizationWindow, Shared) {
    let script: Shared = Rc::default();
    let mut window = RealizationWindow::new(window_config())
        .unwrap()
        .with_debug(debug);
    window
        .load(Arc::from(carriers), vec![pool_setup(&script, pool)])
        .unwrap();
    (window, script)
}

fn load(carriers: Vec<Carrier>, pool: PoolConfig) -> (RealizationWindow, Shared) {
    load_with(carriers, pool, DebugConfig::default())
}

fn at(display_position: f64) -> PlayPosition {
    PlayPosition::new(display_position, 0.0)
}

fn inits_of(script: &Shared, start_roll: f64) -> usize {
    script
        .borrow()
        .events
        .iter()
        .filter(|event| matches!(event, Event::Init { roll, .. } if *roll == start_roll))
        .count()
}

fn finishes(script: &Shared) -> usize {
    script
        .borrow()
        .events
        .iter()
        .filter(|event| matches!(event, Event::Finish { .. }))
        .count()
}

fn assert_consistent(window: &RealizationWindow) {
    let realized: Vec<CarrierId> = window.realized_carriers().collect();
    let flagged = (0..window.carriers().len())
        .filter(|index| window.is_realized(CarrierId(*index as u32)))
        .count();
    assert_eq!(flagged, realized.len());

    for id in realized {
        let visual = window.find_visual(id).expect("realized carrier has a visual");
        if !visual.ignore_display_window() {
            assert!(
                window.is_carrier_in_range(id),
                "{id:?} realized outside both windows"
            );
        }
    }
}

#[test]
fn forward_sweep_realizes_entering_carrier_once() {
    let (mut window, script) = load(
        vec![roll_carrier(0.0, 1.0), roll_carrier(5.0, 6.0)],
        roomy_pool(),
    );

    let mut position = -3.0;
    while position <= 2.5 {
        window.tick(at(position));
        let realized = window.is_realized(CarrierId(0));
        if position < -2.0 {
            assert!(!realized, "realized too early at {position}");
        } else if position <= 1.5 {
            assert!(realized, "not realized at {position}");
        } else {
            assert!(!realized, "still realized at {position}");
        }
        assert_consistent(&window);
        position += 0.25;
    }

    assert_eq!(inits_of(&script, 0.0), 1);
    assert_eq!(inits_of(&script, 5.0), 0);
    assert_eq!(finishes(&script), 1);
}

#[test]
fn rewind_re_realizes_passed_carrier_once() {
    let (mut window, script) = load(
        vec![roll_carrier(0.0, 1.0), roll_carrier(5.0, 6.0)],
        roomy_pool(),
    );

    for position in [-3.0, -2.0, 0.0, 1.0, 2.5] {
        window.tick(at(position));
    }
    assert!(!window.is_realized(CarrierId(0)));
    assert_eq!(inits_of(&script, 0.0), 1);

    window.tick(at(1.0));
    assert!(window.is_realized(CarrierId(0)));
    window.tick(at(0.5));
    assert!(window.is_realized(CarrierId(0)));
    assert_eq!(inits_of(&script, 0.0), 2);
    assert_eq!(inits_of(&script, 5.0), 0);
    assert_consistent(&window);
}

#[test]
fn boundary_ties_count_as_inside_in_both_directions() {
    let (mut window, _script) = load(vec![roll_carrier(0.0, 1.0)], roomy_pool());

    window.tick(at(-2.0));
    assert!(window.is_realized(CarrierId(0)));

    window.tick(at(2.5));
    assert!(!window.is_realized(CarrierId(0)));

    // Lower boundary of the carrier's end edge sits exactly at 1.5.
    window.tick(at(1.5));
    assert!(window.is_realized(CarrierId(0)));
}

#[test]
fn budget_exhaustion_defers_and_retries_without_loss() {
    let pool = PoolConfig {
        buffered_idle_target: 0,
        max_instantiations_per_tick: 1,
    };
    let (mut window, script) = load(
        vec![
            roll_carrier(0.0, 10.0),
            roll_carrier(0.1, 10.0),
            roll_carrier(0.2, 10.0),
        ],
        pool,
    );

    let first = window.tick(at(0.5));
    assert_eq!(first.realized, 1);
    assert_eq!(first.deferred, 2);
    assert_eq!(first.over_budget_pools, 1);

    let second = window.tick(at(0.5));
    assert_eq!(second.retried, 2);
    assert_eq!(second.realized, 1);
    assert_eq!(second.deferred, 1);

    let third = window.tick(at(0.5));
    assert_eq!(third.retried, 1);
    assert_eq!(third.realized, 1);
    assert_eq!(third.deferred, 0);
    assert_eq!(third.over_budget_pools, 0);

    assert_eq!(window.realized_count(), 3);
    assert_eq!(window.deferred_count(), 0);
    assert_eq!(script.borrow().created, 3);

    let diagnostics = window.diagnostics();
    assert_eq!(diagnostics.over_budget_ticks, 2);
    assert_eq!(diagnostics.deferred_realizations, 3);
    assert_eq!(diagnostics.total_realizations, 3);
    assert_consistent(&window);
}

#[test]
fn dense_chart_never_exceeds_pool_budget() {
    let carriers = (0..40)
        .map(|index| {
            let start = index as f64 * 0.05;
            roll_carrier(start, start + 0.5)
        })
        .collect();
    let pool = PoolConfig {
        buffered_idle_target: 2,
        max_instantiations_per_tick: 2,
    };
    let (mut window, _script) = load(carriers, pool);

    let mut position = -3.0;
    while position <= 6.0 {
        window.tick(at(position));
        let pool = window.pool(Category(0)).unwrap();
        assert!(pool.instantiated_this_tick() <= 2);
        assert_consistent(&window);
        position += 0.125;
    }

    // Sweep back over the whole chart as well.
    while position >= -3.0 {
        window.tick(at(position));
        assert!(window.pool(Category(0)).unwrap().instantiated_this_tick() <= 2);
        assert_consistent(&window);
        position -= 0.5;
    }
}

#[test]
fn judge_window_keeps_offscreen_carriers_realized() {
    let (mut window, _script) = load(vec![timed_carrier(1.0, 1.2)], roomy_pool());
    let id = CarrierId(0);

    window.tick(PlayPosition::new(0.0, 0.0));
    assert!(!window.is_realized(id));

    window.tick(PlayPosition::new(0.0, 0.6));
    assert!(window.is_realized(id));

    window.tick(PlayPosition::new(0.0, 1.6));
    assert!(window.is_realized(id));

    window.tick(PlayPosition::new(0.0, 1.8));
    assert!(!window.is_realized(id));
}

#[test]
fn judge_time_rewind_reseats_time_cursor() {
    let (mut window, script) = load(vec![timed_carrier(1.0, 1.2)], roomy_pool());
    let id = CarrierId(0);

    window.tick(PlayPosition::new(0.0, 1.0));
    window.tick(PlayPosition::new(0.0, 3.0));
    assert!(!window.is_realized(id));

    window.tick(PlayPosition::new(0.0, 0.0));
    assert!(!window.is_realized(id));

    window.tick(PlayPosition::new(0.0, 0.7));
    assert!(window.is_realized(id));
    assert_eq!(inits_of(&script, 1000.0), 2);
}

#[test]
fn updates_every_realized_visual_each_tick() {
    let (mut window, script) = load(
        vec![roll_carrier(0.0, 5.0), roll_carrier(0.5, 5.0)],
        roomy_pool(),
    );

    window.tick(at(0.0));
    window.tick(at(0.25));

    let updates = script
        .borrow()
        .events
        .iter()
        .filter(|event| matches!(event, Event::Update { .. }))
        .count();
    assert_eq!(updates, 4);
}

#[test]
fn unload_finishes_every_realized_entry() {
    let carriers = (0..4)
        .map(|index| roll_carrier(index as f64 * 0.1, 5.0))
        .collect();
    let (mut window, script) = load(carriers, roomy_pool());

    window.tick(at(0.0));
    assert_eq!(window.realized_count(), 4);
    assert_eq!(finishes(&script), 0);

    assert_eq!(window.unload(), 4);
    assert_eq!(finishes(&script), 4);
    assert_eq!(window.realized_count(), 0);
    assert!(!window.is_loaded());

    let script = script.borrow();
    assert_eq!(script.destroyed, script.created);
    drop(script);

    assert_eq!(window.tick(at(1.0)), TickReport::default());
}

#[test]
fn ignore_display_window_keeps_visual_until_finished() {
    let (mut window, script) = load(vec![roll_carrier(0.0, 1.0)], roomy_pool());
    let id = CarrierId(0);

    window.tick(at(0.0));
    assert!(window.is_realized(id));

    script.borrow_mut().ignore_window = true;
    window.tick(at(5.0));
    assert!(window.is_realized(id));
    assert!(!window.is_carrier_in_range(id));

    script.borrow_mut().finish_all = true;
    window.tick(at(5.0));
    assert!(!window.is_realized(id));
    assert_eq!(finishes(&script), 1);
}

#[test]
fn visual_finished_on_init_is_released_immediately() {
    let (mut window, script) = load(vec![roll_carrier(0.0, 1.0)], roomy_pool());
    script.borrow_mut().finish_on_init = true;

    let report = window.tick(at(0.0));
    assert_eq!(report.realized, 0);
    assert_eq!(window.realized_count(), 0);
    assert_eq!(
        script.borrow().events,
        vec![
            Event::Init {
                instance: 4,
                roll: 0.0
            },
            Event::Finish { instance: 4 },
        ]
    );
    assert_eq!(window.pool(Category(0)).unwrap().idle_count(), 4);
}

#[test]
fn carriers_without_pool_are_excluded() {
    let script: Shared = Rc::default();
    let mut orphan = roll_carrier(0.0, 1.0);
    orphan.category = Category(7);
    let carriers: Arc<[Carrier]> = Arc::from(vec![orphan, roll_carrier(0.0, 1.0)]);

    let mut window = RealizationWindow::new(window_config()).unwrap();
    let summary = window
        .load(carriers, vec![pool_setup(&script, roomy_pool())])
        .unwrap();
    assert_eq!(summary, LoadSummary { loaded: 1, excluded: 1 });
    assert_eq!(window.diagnostics().excluded_carriers, 1);

    window.tick(at(0.0));
    assert!(!window.is_realized(CarrierId(0)));
    assert!(window.is_realized(CarrierId(1)));
}

#[test]
fn invalid_carriers_are_excluded() {
    let script: Shared = Rc::default();
    let stalled = roll_carrier(0.0, 1.0).with_speed_scale(0.0);
    let reversed = roll_carrier(0.0, 1.0).with_speed_scale(-1.0);
    let carriers: Arc<[Carrier]> =
        Arc::from(vec![stalled, reversed, roll_carrier(0.0, 1.0)]);

    let mut window = RealizationWindow::new(window_config()).unwrap();
    let summary = window
        .load(carriers, vec![pool_setup(&script, roomy_pool())])
        .unwrap();
    assert_eq!(summary, LoadSummary { loaded: 1, excluded: 2 });
    assert_eq!(window.tracked_count(), 1);

    for position in [-3.0, -1.0, 0.0, 0.5] {
        window.tick(at(position));
        assert!(!window.is_realized(CarrierId(0)));
        assert!(!window.is_realized(CarrierId(1)));
        assert_consistent(&window);
    }
    assert!(window.is_realized(CarrierId(2)));
}

#[test]
fn duplicate_pools_are_rejected() {
    let script: Shared = Rc::default();
    let mut window = RealizationWindow::new(window_config()).unwrap();
    let result = window.load(
        Arc::from(vec![roll_carrier(0.0, 1.0)]),
        vec![
            pool_setup(&script, roomy_pool()),
            pool_setup(&script, roomy_pool()),
        ],
    );
    assert!(matches!(result, Err(WindowError::InvalidConfig(_))));
    assert!(!window.is_loaded());
}

#[test]
fn load_prebuffers_pools_beyond_tick_budget() {
    let pool = PoolConfig {
        buffered_idle_target: 3,
        max_instantiations_per_tick: 1,
    };
    let (window, _script) = load(vec![roll_carrier(0.0, 1.0)], pool);
    assert_eq!(window.pool(Category(0)).unwrap().idle_count(), 3);

    let carriers = (0..5).map(|index| roll_carrier(index as f64, 9.0)).collect();
    let debug = DebugConfig {
        prebuffer_all_at_once: true,
        ..DebugConfig::default()
    };
    let (window, _script) = load_with(carriers, pool, debug);
    assert_eq!(window.pool(Category(0)).unwrap().idle_count(), 5);
}

#[test]
fn destroy_without_recycling_disposes_released_visuals() {
    let pool = PoolConfig {
        buffered_idle_target: 0,
        max_instantiations_per_tick: 4,
    };
    let debug = DebugConfig {
        destroy_without_recycling: true,
        ..DebugConfig::default()
    };
    let (mut window, script) = load_with(vec![roll_carrier(0.0, 1.0)], pool, debug);

    window.tick(at(0.0));
    window.tick(at(5.0));
    assert_eq!(script.borrow().destroyed, 1);
    assert_eq!(window.pool(Category(0)).unwrap().idle_count(), 0);
}

#[test]
fn per_carrier_speed_scale_moves_its_boundary() {
    let (mut window, _script) = load(
        vec![roll_carrier(0.0, 1.0).with_speed_scale(2.0)],
        roomy_pool(),
    );

    window.tick(at(-1.5));
    assert!(!window.is_realized(CarrierId(0)));
    window.tick(at(-1.0));
    assert!(window.is_realized(CarrierId(0)));
}

#[test]
fn speed_scale_change_resorts_boundaries() {
    let (mut window, _script) = load(vec![roll_carrier(0.0, 1.0)], roomy_pool());

    window.tick(at(-3.0));
    window.set_speed_scale(2.0).unwrap();
    window.tick(at(-1.5));
    assert!(!window.is_realized(CarrierId(0)));
    window.tick(at(-1.0));
    assert!(window.is_realized(CarrierId(0)));

    assert!(window.set_speed_scale(0.0).is_err());
}

#[test]
fn widening_the_window_picks_up_covered_carriers() {
    let (mut window, _script) = load(vec![roll_carrier(2.0, 3.0)], roomy_pool());

    window.tick(at(-1.5));
    assert!(!window.is_realized(CarrierId(0)));

    window.set_speed_scale(0.5).unwrap();
    window.tick(at(-1.5));
    assert!(window.is_realized(CarrierId(0)));
    assert_consistent(&window);
}

#[test]
fn find_visual_mut_reaches_bound_instance() {
    let (mut window, _script) = load(vec![roll_carrier(0.0, 1.0)], roomy_pool());
    assert!(window.find_visual_mut(CarrierId(0)).is_none());

    window.tick(at(0.0));
    let view = window.view();
    let carrier = window.carrier(CarrierId(0)).cloned().unwrap();
    let visual = window.find_visual_mut(CarrierId(0)).unwrap();
    visual.update_visual(&carrier, &view);
    assert!(!visual.is_visual_finished());
}
