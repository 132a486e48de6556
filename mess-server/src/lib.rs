//! Mess POS core engine
//!
//! In-process operations for a canteen point-of-sale: student accounts and
//! cash ledger, meal plans, the append-only transaction log, RFID card
//! reassignment, and the staff attendance punch clock. A thin transport
//! layer (not part of this crate) calls into [`engine::TransactionEngine`]
//! and the individual services.

pub mod accounts;
pub mod attendance;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod plans;
pub mod reassignment;
pub mod receipts;
pub mod storage;
pub mod transactions;
pub mod utils;
