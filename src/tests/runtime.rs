use std::{future::Future, time::Duration};

pub(super) fn block_on<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::runtime::Runtime::new().unwrap().block_on(f)
}

pub(super) async fn async_sleep(d: Duration) {
    tokio::time::sleep(d).await;
}
