//! Small helpers: ids, counters, dot-notation data access, environment and constants, timing.

pub mod data;
pub mod env;
pub mod ticker;
pub mod timer;
pub mod uuid;

pub use data::{array_dot, array_get, array_partition, data_get, is_array_access, is_blank, is_filled, Needle};
pub use env::{env, env_or, env_parse, Constants};
pub use ticker::increment;
pub use timer::Stopwatch;
pub use self::uuid::{uuid, uuid4};
