// Modules
mod accumulator;
mod base_logger;
mod callback;
mod callback_list;
mod clock;
mod early_stopping;
mod error;
mod history;
mod logs;
mod model;
mod model_checkpoint;
mod plot;
mod plotter;
mod progress;
mod remote_monitor;

pub use accumulator::EpochAccumulator;
pub use base_logger::BaseLogger;
pub use callback::Callback;
pub use callback_list::{CallbackList, DEFAULT_QUEUE_LENGTH, Hook, SlowDispatch};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use early_stopping::EarlyStopping;
pub use error::CallbackError;
pub use history::History;
pub use logs::{Logs, Params, keys};
pub use model::{Model, ModelHandle, WeakModel};
pub use model_checkpoint::ModelCheckpoint;
pub use plot::{PlotConfig, PlotConfigBuilder, PlotGenerator, PlotRenderer};
pub use plotter::Plotter;
pub use progress::{Progbar, ProgressDisplay};
pub use remote_monitor::{DEFAULT_ROOT, RemoteMonitor};

pub mod prelude {
    pub use crate::{
        BaseLogger, Callback, CallbackError, CallbackList, EarlyStopping, History, Logs, Model,
        ModelCheckpoint, ModelHandle, Params, Plotter, RemoteMonitor,
    };
}
