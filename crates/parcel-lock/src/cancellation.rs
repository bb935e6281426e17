use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use log::warn;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::flag;
use signal_hook::SigId;

/// Cooperative abort flag, observed between discrete actions only.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

struct SignalRegistry {
    token: CancellationToken,
    _handles: Vec<SigId>,
}

impl SignalRegistry {
    fn new() -> Self {
        let token = CancellationToken::new();
        let mut handles = Vec::new();
        for signal in [SIGINT, SIGTERM] {
            match flag::register(signal, token.flag.clone()) {
                Ok(handle) => handles.push(handle),
                Err(err) => warn!("failed to register cancellation handler for signal {signal}: {err}"),
            }
        }
        Self {
            token,
            _handles: handles,
        }
    }
}

/// Token flipped by SIGINT/SIGTERM.
pub fn global_token() -> CancellationToken {
    static REGISTRY: OnceLock<SignalRegistry> = OnceLock::new();
    REGISTRY.get_or_init(SignalRegistry::new).token.clone()
}
