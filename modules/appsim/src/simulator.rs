//! App simulator: replays a batch against a dispatch target, fail-fast.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{Result, SimError};
use crate::target::{DispatchError, DispatchTarget};
use crate::types::{AppResponse, InteractionBatch};

pub struct AppSimulator {
    target: Arc<dyn DispatchTarget>,
    dispatch_timeout: Duration,
}

impl AppSimulator {
    pub fn new(target: Arc<dyn DispatchTarget>) -> Self {
        Self {
            target,
            dispatch_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    /// Apply every interaction in order, then capture one snapshot.
    ///
    /// The first rejected interaction aborts the batch. An empty batch never
    /// touches the target.
    pub async fn simulate(&self, batch: &InteractionBatch) -> Result<AppResponse> {
        if batch.is_empty() {
            info!("Empty batch, target left untouched");
            return Ok(AppResponse::empty());
        }

        for (index, interaction) in batch.iter().enumerate() {
            let sent = self.bounded(self.target.dispatch(
                interaction.event_type(),
                interaction.element_id(),
                interaction.value(),
            ));
            match sent.await? {
                Ok(()) => {}
                Err(DispatchError::Rejected(reason)) => {
                    warn!(
                        index,
                        element_id = interaction.element_id(),
                        reason = reason.as_str(),
                        "Interaction rejected, aborting batch"
                    );
                    return Err(SimError::InteractionRejected {
                        index,
                        element_id: interaction.element_id().to_string(),
                        reason,
                    });
                }
                Err(DispatchError::Unreachable(reason)) => {
                    return Err(SimError::TargetUnreachable(reason));
                }
            }
        }

        let response = match self.bounded(self.target.current_state()).await? {
            Ok(response) => response,
            Err(DispatchError::Unreachable(reason) | DispatchError::Rejected(reason)) => {
                return Err(SimError::TargetUnreachable(reason));
            }
        };

        info!(
            events = batch.len(),
            bytes = response.body.len(),
            "Simulation captured response"
        );
        Ok(response)
    }

    async fn bounded<F, T>(&self, call: F) -> Result<T>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::time::timeout(self.dispatch_timeout, call)
            .await
            .map_err(|_| {
                SimError::TargetUnreachable(format!(
                    "no answer within {:?}",
                    self.dispatch_timeout
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::EchoTarget;
    use crate::types::{EventType, InteractionValue, UserInteraction};
    use async_trait::async_trait;

    struct Down;

    #[async_trait]
    impl DispatchTarget for Down {
        async fn dispatch(
            &self,
            _: EventType,
            _: &str,
            _: Option<&InteractionValue>,
        ) -> std::result::Result<(), DispatchError> {
            Err(DispatchError::Unreachable("connection refused".to_string()))
        }

        async fn current_state(&self) -> std::result::Result<AppResponse, DispatchError> {
            Err(DispatchError::Unreachable("connection refused".to_string()))
        }
    }

    struct Hanging;

    #[async_trait]
    impl DispatchTarget for Hanging {
        async fn dispatch(
            &self,
            _: EventType,
            _: &str,
            _: Option<&InteractionValue>,
        ) -> std::result::Result<(), DispatchError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn current_state(&self) -> std::result::Result<AppResponse, DispatchError> {
            Ok(AppResponse::empty())
        }
    }

    #[tokio::test]
    async fn empty_batch_does_not_contact_target() {
        let target = Arc::new(EchoTarget::new());
        let sim = AppSimulator::new(target.clone());
        let response = sim.simulate(&InteractionBatch::default()).await.unwrap();
        assert!(response.parse().unwrap().event_log.is_empty());
        assert_eq!(target.contacts(), 0);
    }

    #[tokio::test]
    async fn unreachable_target_fails() {
        let sim = AppSimulator::new(Arc::new(Down));
        let batch = InteractionBatch::new(vec![UserInteraction::click("btn1")]);
        let err = sim.simulate(&batch).await.unwrap_err();
        assert_eq!(err, SimError::TargetUnreachable("connection refused".to_string()));
    }

    #[tokio::test]
    async fn stalled_dispatch_times_out_as_unreachable() {
        let sim = AppSimulator::new(Arc::new(Hanging))
            .with_dispatch_timeout(Duration::from_millis(20));
        let batch = InteractionBatch::new(vec![UserInteraction::click("btn1")]);
        let err = sim.simulate(&batch).await.unwrap_err();
        assert!(matches!(err, SimError::TargetUnreachable(_)));
    }
}
