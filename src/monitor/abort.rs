use tokio_util::sync::CancellationToken;

/// Creates the abort flag for one run.
///
/// The trigger half is not `Clone`: whoever owns it is the only writer. The
/// signal half is handed down to every layer that needs to poll it.
pub fn abort_pair() -> (AbortTrigger, AbortSignal) {
    let token = CancellationToken::new();
    (AbortTrigger { token: token.clone() }, AbortSignal { token })
}

/// Write side of the abort flag. Setting it is permanent for the run.
#[derive(Debug)]
pub struct AbortTrigger {
    token: CancellationToken,
}

impl AbortTrigger {
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Read side of the abort flag, cheap to clone.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    token: CancellationToken,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the flag is set.
    pub async fn aborted(&self) {
        self.token.cancelled().await
    }

    /// A signal that is never set; for running probes outside an orchestrated run.
    pub fn never() -> Self {
        Self { token: CancellationToken::new() }
    }
}
