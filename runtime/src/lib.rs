//! # Flash Sale Runtime
//!
//! The allocation core itself: the [`coordinator::ReservationCoordinator`] that
//! runs `ExecuteFlashSale`, the [`compensator::Compensator`] that undoes failed
//! reservations, [`admin::ActivityAdmin`] for activity writes, and the
//! [`service::FlashSaleService`] facade that ties them to a
//! [`environment::FlashSaleEnvironment`].
//!
//! Also provided:
//!
//! - [`memory::InMemoryAdmissionGate`]: single-node stock ledger and participation guard
//! - [`order_number::SequencedOrderNumbers`]: order number generator
//! - [`metrics`]: Prometheus metrics

pub mod admin;
pub mod compensator;
pub mod coordinator;
pub mod environment;
pub mod memory;
pub mod metrics;
pub mod order_number;
pub mod service;

pub use admin::ActivityAdmin;
pub use compensator::{Compensator, Reservation};
pub use coordinator::ReservationCoordinator;
pub use environment::{FlashSaleEnvironment, FlashSaleSettings};
pub use memory::InMemoryAdmissionGate;
pub use order_number::SequencedOrderNumbers;
pub use service::FlashSaleService;
