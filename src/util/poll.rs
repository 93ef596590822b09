use std::{
    future::Future,
    task::{Context, Poll},
    thread,
    time::Duration,
};

use futures::task::noop_waker_ref;

use crate::model::fs::FSError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Blocks the current thread until `future` resolves.
///
/// The future is polled with a no-op waker, so any IO it waits on has to be
/// driven by a surrounding Tokio runtime.
pub fn poll_until_ready<Fut, T>(future: Fut) -> T
where
    Fut: Future<Output = T>,
{
    let mut future = Box::pin(future);
    let mut context = Context::from_waker(noop_waker_ref());

    loop {
        match future.as_mut().poll(&mut context) {
            Poll::Ready(result) => {
                return result;
            }
            Poll::Pending => {
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

/// Like [`poll_until_ready`], converting the client error into an
/// [`FSError::Remote`] tagged with the call and key.
pub fn poll_remote<Fut, T, E>(operation: &'static str, key: &str, future: Fut) -> Result<T, FSError>
where
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    poll_until_ready(future).map_err(|err| FSError::remote(operation, key, err))
}
