use lifecycle::OrderLifecycleService;
use messaging::BrokerHealth;
use tokio::sync::watch;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: OrderLifecycleService,
    pub broker_health: watch::Receiver<BrokerHealth>,
}

impl AppState {
    pub fn new(lifecycle: OrderLifecycleService, broker_health: watch::Receiver<BrokerHealth>) -> Self {
        Self {
            lifecycle,
            broker_health,
        }
    }
}
