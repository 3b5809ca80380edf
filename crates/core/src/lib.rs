//! Core library for the carrier realization window.
//!
//! A timeline processor produces an arena of [`Carrier`]s; a
//! [`RealizationWindow`] decides each tick which of them need a live visual,
//! binds those to instances borrowed from per-category [`ObjectPool`]s, and
//! returns instances once carriers leave both the display and judge windows.
//! Rendering, audio, and judging stay outside and talk to the window only
//! through [`VisualBinding`], [`VisualFactory`], and [`PlayPosition`].

pub mod carrier;
pub mod chart;
pub mod clock;
pub mod config;
pub mod error;
pub mod fraction;
pub mod pointer_list;
pub mod pool;
pub mod visual;
pub mod window;

pub use carrier::{Carrier, CarrierId, CarrierTiming, Category};
pub use chart::ChartFile;
pub use clock::{PlayPosition, PlaybackClock};
pub use config::{CategoryConfig, DebugConfig, LayerConfig, PoolConfig, WindowConfig};
pub use error::{Result, WindowError};
pub use fraction::Fraction;
pub use pointer_list::PointerList;
pub use pool::ObjectPool;
pub use visual::{LayerView, VisualBinding, VisualFactory};
pub use window::{LoadSummary, PoolSetup, RealizationWindow, TickReport, WindowDiagnostics};
