//! Input peer of the inter-domain routing MPC protocol.
//!
//! Each round the input peer loads its private routing data, splits it into
//! shares for the privacy peers, runs one session per privacy peer and writes
//! the routing decision the privacy peers compute.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(not(feature = "std"))]
use core::panic::PanicInfo;

#[cfg(not(feature = "std"))]
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! { loop {} }

pub mod field;
pub mod entropy;
pub mod mpc;
pub mod dataset;
pub mod shares;
pub mod protocol;
pub mod config;
pub mod output;
#[cfg(feature = "std")]
pub mod net;
#[cfg(feature = "std")]
pub mod session;
#[cfg(feature = "std")]
pub mod controller;

pub use config::IdrConfig;
pub use dataset::TopologyDataset;
pub use shares::{generate, ShareFamily};
pub use protocol::{FinalResultEvent, ResultAggregator, RoundObserver};
#[cfg(feature = "std")]
pub use controller::{RoundController, ControllerError};

/// Crate version packed as `0xMMmmpp`.
pub const fn version() -> u32 {
    0x000300
}
