// ==========================================
// 列车投运排程 - 排程取消信号
// ==========================================
// 取消后: 中止远程请求；尚未完成校验的列车不再落库
// ==========================================

use tokio::sync::watch;

/// 取消句柄（调用方持有）
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// 取消信号（引擎持有）
#[derive(Debug, Clone)]
pub struct RunCancellation {
    rx: watch::Receiver<bool>,
}

/// 创建一对取消句柄/信号
pub fn cancellation_pair() -> (CancelHandle, RunCancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, RunCancellation { rx })
}

impl RunCancellation {
    /// 永不取消的信号
    pub fn never() -> Self {
        cancellation_pair().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// 等待取消；句柄被丢弃且未取消时永不返回
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let (handle, signal) = cancellation_pair();
        assert!(!signal.is_cancelled());

        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.cancelled().await }
        });
        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_never_does_not_resolve() {
        let signal = RunCancellation::never();
        let res = tokio::time::timeout(Duration::from_millis(50), signal.cancelled()).await;
        assert!(res.is_err());
    }
}
