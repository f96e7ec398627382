pub mod cli;
pub mod clock;
mod commands;
pub mod gate;
pub mod notify;
pub mod settings;
pub mod store;
pub mod utils;
pub mod window;

use anyhow::Context;
use cli::Cli;

pub use clock::{Clock, ManualClock, SystemClock};
pub use gate::{classify, GateController, GateSnapshot, GateSurface, GateView, Phase};
pub use notify::{Notification, Severity, Toast, ToastCenter, ToastSink};
pub use window::{LoadedWindow, VotingWindowConfig, WindowSource};

pub fn run(cli: Cli) -> anyhow::Result<()> {
    utils::logging::init_logging();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build the tokio runtime")?;

    runtime.block_on(commands::dispatch(cli))
}
