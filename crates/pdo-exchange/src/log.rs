/// Trait for structs that provide metadata for logging
pub trait LogMetadata {
    fn meta(&self) -> String;
}

/// Identifies which engine and which part of it emitted a record.
#[derive(Debug, Clone)]
pub struct EngineLogContext {
    pub engine: String,
    pub component: &'static str,
}

impl EngineLogContext {
    pub fn new(engine: &str, component: &'static str) -> Self {
        Self {
            engine: engine.to_string(),
            component,
        }
    }
}

impl LogMetadata for EngineLogContext {
    fn meta(&self) -> String {
        format!("engine={}, component={}", self.engine, self.component)
    }
}

/// Context of a running exchange loop, tagged with the cycle counter.
pub struct CycleLogContext<'a> {
    pub base: &'a EngineLogContext,
    pub cycle: u64,
}

impl LogMetadata for CycleLogContext<'_> {
    fn meta(&self) -> String {
        format!("{}, cycle={}", self.base.meta(), self.cycle)
    }
}

// =============================================
// Logging Macros (namespaced under crate::log)
// =============================================

macro_rules! ctx_info {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        ::log::info!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
}

macro_rules! ctx_warn {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        ::log::warn!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
}

macro_rules! ctx_error {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        ::log::error!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
}

macro_rules! ctx_debug {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        ::log::debug!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
}

// Per-cycle records; the metadata string is only built when trace is enabled.
macro_rules! ctx_trace {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        if ::log::log_enabled!(::log::Level::Trace) {
            let meta = $crate::log::LogMetadata::meta(&$ctx);
            ::log::trace!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
        }
    }};
}

// Re-export macros for use in other files
pub(crate) use ctx_debug;
pub(crate) use ctx_error;
pub(crate) use ctx_info;
pub(crate) use ctx_trace;
pub(crate) use ctx_warn;
