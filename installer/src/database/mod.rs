// Database layer: version ordering, parameter substitution, connection targets and SQL execution.

pub mod connection;
pub mod context;
pub mod executor;
pub mod parameters;
pub mod versions;
