//! Simulated annealing with an asynchronous, memoized cost function.
//!
//! The schedule is geometric: a fixed number of cooling stages, each at a
//! temperature `fraction` times the previous one. Worse candidates are
//! accepted with the Boltzmann-like probability
//! `exp((current - candidate) / (k * T))`, which lets the search leave
//! local minima while the temperature is high.
//!
//! # References
//!
//! - Kirkpatrick, Gelatt & Vecchi (1983), "Optimization by Simulated Annealing"
//! - Cerny (1985), "Thermodynamical Approach to the Travelling Salesman Problem"

mod config;
mod runner;
mod types;

pub use config::AnnealConfig;
pub use runner::{acceptance_probability, merit, AnnealResult, Annealer};
pub use types::{neighbor_fn, CoefficientNudge, NeighborFn, Neighborhood, ProgressEvent};
