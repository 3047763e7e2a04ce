//! Consumer loop orchestrating commands, collaborators and the lifecycle
//! engine.

mod consumer;

pub use consumer::{
    ConsumerPorts, ConsumerSettings, MaintenanceReport, ProcessedEntry, ReviewConsumer,
};
