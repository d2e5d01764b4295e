use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::Authorization;
use crate::locks::ScheduleLocks;
use crate::service::Service;
use crate::store::Store;
use crate::{Config, Error};

use sqlx::pool::PoolOptions;
use sqlx::MySqlPool;

#[derive(Clone, Debug)]
pub struct State(Arc<StateInner>);

impl State {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let pool: MySqlPool = PoolOptions::new()
            .max_connections(8)
            .max_lifetime(Duration::new(3600, 0))
            .idle_timeout(Duration::new(60, 0))
            .connect_lazy(&config.database.connect_string())?;

        let store = Store {
            pool,
            table_prefix: config.database.prefix.clone(),
        };

        let auth = Authorization::new(&config.authorization);

        let service = Service::new(store.clone(), ScheduleLocks::new());

        Ok(Self(Arc::new(StateInner {
            store,
            auth,
            service,
        })))
    }
}

impl Deref for State {
    type Target = StateInner;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub struct StateInner {
    pub store: Store,
    pub auth: Authorization,
    pub service: Service,
}
