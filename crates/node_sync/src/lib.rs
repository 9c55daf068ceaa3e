//! # Node Sync
//!
//! The cross-region sync engine: batched, compressed, ordered delta
//! propagation between regions over a durable pub/sub bus, together with
//! the conflict resolver that reconciles concurrent mutations.
//!
//! ## Pipeline
//!
//! ```text
//! local mutation -> DeltaRecorder -> BatchProducer -> EventBusClient
//!                                                          |
//! peer region <---------------------------------------------
//!      |
//!      v
//! EventBusClient -> BatchConsumer -> ConflictResolver -> chunk store
//! ```
//!
//! ## Thread Safety
//!
//! The recorder's ring is append-only under a short-held lock; the
//! producer drains it from a single background task. There is no
//! contention between the simulation tick (which only appends) and the
//! publish path (which only drains).

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod batch;
pub mod delta;
pub mod error;
pub mod eventbus;
pub mod position;
pub mod recorder;
pub mod resolver;

pub use batch::{BatchConfig, BatchConsumer, BatchProducer};
pub use delta::{AttrValue, ChangeKind, ChangeRecord, CoalesceKey};
pub use error::{SyncError, SyncResult};
pub use eventbus::{Ack, EventBusClient, EventBusConfig, Message, NatsEventBus};
pub use position::{DurablePositionCache, InMemoryPositionCache, PositionCache};
pub use recorder::DeltaRecorder;
pub use resolver::{ConflictResolver, LastWriterWins, Resolution};
