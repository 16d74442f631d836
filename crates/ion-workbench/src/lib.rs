//! Workbench for the ION object repository.
//!
//! A [`Workbench`] owns every repository of one process and moves them
//! between processes. Transfers are shallow by default: a pull brings the
//! mutable head, the commits the puller lacks and the object trees of the
//! branch heads. Older content is fetched lazily when a checkout or link
//! resolution misses it locally.
//!
//! Received branches merge per branch key: fast-forward where one side
//! descends from the other, otherwise both heads are kept and the
//! repository merges them by date on the next checkout.
//!
//! Peers talk through a [`Transport`]. [`LocalTransport`] connects
//! workbenches within one process.

pub mod config;
pub mod error;
pub mod handler;
pub mod sync;
pub mod transport;
pub mod types;
pub mod workbench;

#[cfg(test)]
mod fixtures;

pub use config::WorkbenchConfig;
pub use error::{WorkbenchError, WorkbenchResult};
pub use transport::{LocalTransport, Transport};
pub use types::{BranchUpdate, FetchResult, PushResult, ReceiveResult};
pub use workbench::Workbench;
