// src/backend/utils/log.rs
//! Level-prefixed debug-print logging. Inside a canister lines go to the
//! replica log through `ic_cdk::println!`; host builds (unit tests) print to
//! stderr since the system API is unavailable there.

#[doc(hidden)]
pub fn emit(level: &str, line: std::fmt::Arguments<'_>) {
    #[cfg(target_arch = "wasm32")]
    ic_cdk::println!("{}: {}", level, line);
    #[cfg(not(target_arch = "wasm32"))]
    eprintln!("{}: {}", level, line);
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::utils::log::emit("INFO", format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::utils::log::emit("WARN", format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::utils::log::emit("ERROR", format_args!($($arg)*))
    };
}
