//! Adapter implementations for graph production ports.

pub mod command;
pub mod split;

pub use command::CommandGraphProducer;
pub use split::EvenSplitExpander;
