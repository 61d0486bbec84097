//! Confirmation polling.

use std::sync::Arc;
use std::time::Duration;

use pulse_types::BundleHash;

use crate::counter::ErrorCounter;
use crate::Gateway;

/// Block until any transaction of `bundle_hash` is reported confirmed.
///
/// Transient gateway errors are retried after `penalty_sleep`; a verdict
/// from the error counter is logged but does not abort the wait — there is
/// no upper bound on how long a bundle may take to confirm, and recovery
/// from a dead endpoint is left to external restart or alerting.
pub async fn wait_until_confirmed(
    gateway: &dyn Gateway,
    counter: &Arc<dyn ErrorCounter>,
    bundle_hash: &BundleHash,
    poll_every: Duration,
    penalty_sleep: Duration,
) {
    loop {
        let result = gateway.is_confirmed(bundle_hash).await;
        let too_many = counter.check(gateway.endpoint(), result.is_err());
        match result {
            Ok(true) => return,
            Ok(false) => tokio::time::sleep(poll_every).await,
            Err(err) => {
                tracing::warn!(
                    bundle = %bundle_hash,
                    endpoint = gateway.endpoint(),
                    too_many,
                    "inclusion query failed: {err}"
                );
                tokio::time::sleep(penalty_sleep).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::PermissiveCounter;
    use crate::null::NullGateway;

    fn bundle_hash() -> BundleHash {
        BundleHash::new("P".repeat(81)).expect("valid hash")
    }

    #[tokio::test(start_paused = true)]
    async fn returns_once_confirmed() {
        let gateway = NullGateway::new("null://test");
        let counter: Arc<dyn ErrorCounter> = Arc::new(PermissiveCounter);
        gateway.confirm_now();

        wait_until_confirmed(
            &gateway,
            &counter,
            &bundle_hash(),
            Duration::from_secs(1),
            Duration::from_secs(5),
        )
        .await;
        assert!(gateway.confirm_polls() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_confirmed() {
        let gateway = Arc::new(NullGateway::new("null://test"));
        let counter: Arc<dyn ErrorCounter> = Arc::new(PermissiveCounter);

        let waiter = {
            let gateway = Arc::clone(&gateway);
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                wait_until_confirmed(
                    gateway.as_ref(),
                    &counter,
                    &bundle_hash(),
                    Duration::from_secs(1),
                    Duration::from_secs(5),
                )
                .await;
            })
        };

        // Let a few unconfirmed polls elapse before flipping the verdict.
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!waiter.is_finished());
        gateway.confirm_now();
        tokio::time::sleep(Duration::from_secs(2)).await;
        waiter.await.expect("waiter completes");
        assert!(gateway.confirm_polls() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_through_gateway_errors() {
        let gateway = Arc::new(NullGateway::new("null://flaky"));
        let counter: Arc<dyn ErrorCounter> = Arc::new(PermissiveCounter);
        gateway.fail_confirm_polls(2);
        gateway.confirm_now();

        wait_until_confirmed(
            gateway.as_ref(),
            &counter,
            &bundle_hash(),
            Duration::from_secs(1),
            Duration::from_secs(5),
        )
        .await;
        // Two failed polls plus the confirming one.
        assert!(gateway.confirm_polls() >= 3);
    }
}
