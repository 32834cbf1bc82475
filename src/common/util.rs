use std::{
    future::Future,
    sync::Arc,
    task::{Context, Poll},
};

use crossbeam_utils::sync::{Parker, Unparker};
use futures_util::{pin_mut, task::ArcWake};

// ===============================================================================================
// Environment
// ===============================================================================================
#[doc(hidden)]
pub(crate) fn read_env_opt(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

// ===============================================================================================
// Futures
// ===============================================================================================
/// Extension trait for efficiently blocking on a future.
#[doc(hidden)]
pub trait Join: Future {
    fn join(self) -> <Self as Future>::Output;
}

impl<F: Future> Join for F {
    fn join(self) -> <Self as Future>::Output {
        struct ThreadWaker(Unparker);

        impl ArcWake for ThreadWaker {
            fn wake_by_ref(arc_self: &Arc<Self>) {
                arc_self.0.unpark();
            }
        }

        let parker = Parker::new();
        let waker = futures_util::task::waker(Arc::new(ThreadWaker(parker.unparker().clone())));
        let mut context = Context::from_waker(&waker);

        let future = self;
        pin_mut!(future);

        loop {
            match future.as_mut().poll(&mut context) {
                Poll::Ready(output) => return output,
                Poll::Pending => parker.park(),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn join_drives_a_ready_future_to_completion() {
        let result: Result<u32, &str> = async { Ok(42) }.join();
        assert_eq!(result, Ok(42));
    }

    #[test]
    fn read_env_opt_ignores_blank_values() {
        std::env::set_var("HTTPHARNESS_UTIL_TEST_BLANK", "  ");
        assert_eq!(read_env_opt("HTTPHARNESS_UTIL_TEST_BLANK"), None);
        std::env::remove_var("HTTPHARNESS_UTIL_TEST_BLANK");

        assert_eq!(read_env_opt("HTTPHARNESS_UTIL_TEST_UNSET"), None);
    }
}
