pub mod controller;
pub mod format;
pub mod runner;
pub mod state;
pub mod surface;

pub use controller::{election_period, GateController, GateSnapshot};
pub use format::{format_remaining, CountdownFields, ZERO_READOUT};
pub use runner::{run_gate, GateRuntime};
pub use state::{classify, transition, GateState, Phase};
pub use surface::{GateSurface, GateView, NullSurface, TerminalSurface};
