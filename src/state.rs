use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

use crate::config::Config;
use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::services::{
    ApprovalChainBuilder, AvailabilityService, BookingWorkflow, MaintenanceService,
    SeaOrmBookingWorkflow, SeaOrmDirectory,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub workflow: Arc<dyn BookingWorkflow>,

    pub availability: Arc<AvailabilityService>,

    pub maintenance: Arc<MaintenanceService>,

    pub event_bus: broadcast::Sender<NotificationEvent>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let (event_bus, _) = broadcast::channel(config.general.event_bus_buffer_size);
        Self::with_event_bus(config, event_bus).await
    }

    pub async fn with_event_bus(
        config: Config,
        event_bus: broadcast::Sender<NotificationEvent>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let directory = Arc::new(SeaOrmDirectory::new(store.clone()));
        let chain_builder = ApprovalChainBuilder::new(directory);

        let workflow = Arc::new(SeaOrmBookingWorkflow::new(
            store.clone(),
            chain_builder,
            event_bus.clone(),
        )) as Arc<dyn BookingWorkflow>;

        let availability = Arc::new(AvailabilityService::new(store.clone()));
        let maintenance = Arc::new(MaintenanceService::new(store.clone()));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            workflow,
            availability,
            maintenance,
            event_bus,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
