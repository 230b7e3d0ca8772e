pub mod init_tracer;

pub use init_tracer::{init_stdout_tracing, LogFilter, LogFilterLevel};
