//! # chainevents-evm
//!
//! The alloy-based EVM implementation of the ChainEvents `EventDecoder`
//! contract, plus schema extraction from standard contract ABI JSON.

pub mod abi;
pub mod decoder;
pub mod normalizer;

pub use abi::{abi_events, event_schema};
pub use decoder::EvmEventDecoder;
