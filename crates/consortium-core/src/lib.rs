//! Clock, configuration, population monitor, and tick cycle for the
//! Consortium community dFBA engine.
//!
//! This crate wires the pool, the reducer, and the agents into a
//! simulation:
//!
//! - [`clock`] -- Tick counter and simulation time.
//! - [`config`] -- YAML configuration.
//! - [`setup`] -- Configuration validation and [`SimulationState`] assembly.
//! - [`monitor`] -- Threshold rules and the [`PopulationMonitor`].
//! - [`tick`] -- The five-phase [`run_tick`].
//! - [`runner`] -- The bounded async loop around [`run_tick`].
//! - [`history`] -- In-memory time series of every tick.
//!
//! [`SimulationState`]: tick::SimulationState
//! [`PopulationMonitor`]: monitor::PopulationMonitor
//! [`run_tick`]: tick::run_tick

pub mod clock;
pub mod config;
pub mod history;
pub mod monitor;
pub mod runner;
pub mod setup;
pub mod tick;
