pub mod clock;
pub mod price_tape;
pub mod signals;
pub mod window;
pub mod workers;

pub use clock::{Clock, ManualClock, SystemClock, WatermarkClock};
pub use price_tape::PriceTape;
pub use signals::{PriceLookup, SignalEngine, SymbolContext};
pub use window::BarWindow;
pub use workers::{spawn_evaluation_loop, SymbolWorkers, WorkerEvent};
