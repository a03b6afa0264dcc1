//! [`ShutdownHook`] – advisory callback run just before the host goes down.

/// Result returned by a hook.  The error is only ever logged.
pub type HookResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A zero-argument action invoked once before committing to shutdown.
///
/// Any closure `FnMut() -> HookResult` is a hook; wrap infallible closures
/// with `|| { ...; Ok(()) }`.
pub trait ShutdownHook: Send {
    fn invoke(&mut self) -> HookResult;
}

impl<F> ShutdownHook for F
where
    F: FnMut() -> HookResult + Send,
{
    fn invoke(&mut self) -> HookResult {
        self()
    }
}

/// Hook used when none is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl ShutdownHook for NoopHook {
    fn invoke(&mut self) -> HookResult {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_is_a_hook() {
        let mut calls = 0;
        {
            let mut hook = || -> HookResult {
                calls += 1;
                Ok(())
            };
            hook.invoke().unwrap();
            hook.invoke().unwrap();
        }
        assert_eq!(calls, 2);
    }

    #[test]
    fn failing_closure_reports_error() {
        let mut hook = || -> HookResult { Err("disk full".into()) };
        let err = hook.invoke().unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn noop_hook_succeeds() {
        assert!(NoopHook.invoke().is_ok());
    }
}
