pub mod bar;
pub mod confidence;
pub mod evaluation;
pub mod signal;
pub mod structure;

pub use bar::*;
pub use confidence::*;
pub use evaluation::*;
pub use signal::*;
pub use structure::*;
