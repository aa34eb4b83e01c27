//! Built-in primitive packages.
//!
//! Each package maps a family of opcodes to handlers and declares the hats
//! it owns. The default table registers all of them.

pub mod control;
pub mod data;
pub mod event;
pub mod operators;
pub mod procedures;
pub mod sensing;

use crate::primitive::BlockPackage;

/// Every built-in package, in registration order.
#[must_use]
pub fn default_packages() -> Vec<Box<dyn BlockPackage>> {
    vec![
        Box::new(control::ControlPackage),
        Box::new(event::EventPackage),
        Box::new(operators::OperatorsPackage),
        Box::new(data::DataPackage),
        Box::new(sensing::SensingPackage),
        Box::new(procedures::ProceduresPackage),
    ]
}
