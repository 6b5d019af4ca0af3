use std::{cell::RefCell, ffi::OsStr};

/// Run at most this many steps before giving up on a program that never halts.
pub const DEFAULT_STEP_LIMIT: u64 = 100_000;

#[derive(Clone, Copy)]
struct Env {
    trace_enabled: bool,
    step_limit: Option<u64>,
}

impl Env {
    fn from_vars() -> Self {
        Env {
            trace_enabled: var_is("SIM80_TRACE", "1"),
            step_limit: var_parse("SIM80_STEP_LIMIT"),
        }
    }
}

thread_local! {
    /// Snapshot of the `SIM80_*` variables, taken by `init` or on first read
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

/// Read the `SIM80_*` variables. Later changes to the process environment are not seen.
pub fn init() {
    ENV.with(|env| *env.borrow_mut() = Some(Env::from_vars()));
}

pub fn is_trace_enabled() -> bool {
    with_env(|env| env.trace_enabled)
}

/// Step limit from the environment, if set to a valid number.
pub fn step_limit() -> Option<u64> {
    with_env(|env| env.step_limit)
}

fn with_env<R>(read: impl FnOnce(Env) -> R) -> R {
    ENV.with(|env| {
        let env = *env.borrow_mut().get_or_insert_with(Env::from_vars);
        read(env)
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}

fn var_parse(name: impl AsRef<OsStr>) -> Option<u64> {
    std::env::var(name.as_ref()).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_limit_must_be_a_number() {
        std::env::set_var("SIM80_LIMIT_UNDER_TEST", " 25 ");
        assert_eq!(var_parse("SIM80_LIMIT_UNDER_TEST"), Some(25));
        std::env::set_var("SIM80_LIMIT_UNDER_TEST", "lots");
        assert_eq!(var_parse("SIM80_LIMIT_UNDER_TEST"), None);
        std::env::remove_var("SIM80_LIMIT_UNDER_TEST");
        assert_eq!(var_parse("SIM80_LIMIT_UNDER_TEST"), None);
    }

    #[test]
    fn read_before_init_uses_the_environment() {
        assert_eq!(step_limit(), var_parse("SIM80_STEP_LIMIT"));
        init();
        assert_eq!(is_trace_enabled(), var_is("SIM80_TRACE", "1"));
    }
}
