mod identified;
mod side;
mod time;

pub use identified::Identified;
pub use side::Side;
pub use time::iso8601;
