// In-process state shared across requests

pub mod session_cache;
