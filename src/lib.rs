//! ethid - Idiosyncratic move monitor for a correlated asset pair
//!
//! Regresses per-minute returns of a dependent asset (ETH) on an
//! explanatory asset (BTC) over a rolling window, accumulates the
//! unexplained residual and raises an alert when its trailing cumulative
//! move crosses a threshold.
//!
//! # Modules
//!
//! - `domain`: Core types (Bar, ReturnObservation, SignalEvent, PipelineError)
//! - `ports`: Trait abstractions (BarFeed, EmissionSink)
//! - `strategy`: Online analytics (ReturnCalculator, RollingRegression, ResidualAccumulator, SignalStateMachine)
//! - `adapters`: External implementations (kline decoding, replay/synthetic feeds, sinks, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Pairing, per-pair orchestration, emission dispatch

pub mod domain;
pub mod ports;
pub mod strategy;
pub mod adapters;
pub mod config;
pub mod application;
