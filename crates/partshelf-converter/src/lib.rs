// ABOUTME: Conversion layer for partshelf, running the external part converter per identifier.
// ABOUTME: Defines the converter runtime trait, the easyeda2kicad process backend, and the orchestrator.

pub mod easyeda;
pub mod orchestrator;
pub mod runtime;
pub mod testing;

pub use easyeda::Easyeda2Kicad;
pub use orchestrator::{ConversionJob, Orchestrator};
pub use runtime::{ConverterError, ConverterExit, ConverterRuntime, forward_output_line};
