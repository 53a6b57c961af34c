//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the business rules for the CORE Test injector:
//! FSM orchestration, auto-injection regulation, the local/remote
//! arbiter and the display model.  All interaction with hardware happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod arbiter;
pub mod commands;
pub mod display;
pub mod events;
pub mod network;
pub mod ports;
pub mod service;
pub mod status;
