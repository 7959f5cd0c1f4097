// SPDX-License-Identifier: MIT

//! Domain types shared by every crate in the workspace: the data model
//! (§3), the `Clock` abstraction, job/trigger identity, and the spread
//! algorithm (§4.6). Nothing here depends on any other crate in the
//! workspace.

pub mod clock;
pub mod job_key;
pub mod model;
pub mod spread;

pub use clock::{Clock, FakeClock, SystemClock};
pub use job_key::{JobKey, TriggerName};
pub use model::{
    AttributeValue, Credentials, OutputWriter, Query, QueryResult, Server, TriggerSpec,
    WriterError,
};
pub use spread::{compute_spread_start, spread_delay};
