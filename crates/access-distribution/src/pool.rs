//! Pool de clientes: un cliente asíncrono por configuración de shard,
//! reusado entre operaciones.
//!
//! Los clientes se indexan por `(base_url, tipo de operación)`; la
//! reconfiguración del mapa de shards no invalida clientes existentes (las
//! conexiones subyacentes se comparten vía `reqwest::Client`).

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::client::{ClientFactory, RestShardClient, ShardClient};
use crate::shard::{OperationType, ShardConfig};

pub struct RestClientFactory {
    http: reqwest::Client,
    clients: DashMap<(String, OperationType), Arc<RestShardClient>>,
}

impl RestClientFactory {
    pub fn new(request_timeout: Duration) -> Self {
        let http = reqwest::Client::builder().timeout(request_timeout)
                                             .build()
                                             .expect("reqwest client");
        RestClientFactory { http, clients: DashMap::new() }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

impl ClientFactory for RestClientFactory {
    fn client_for(&self, shard: &ShardConfig, operation: OperationType) -> Arc<dyn ShardClient> {
        let key = (shard.base_url.clone(), operation);
        let client = self.clients
                         .entry(key)
                         .or_insert_with(|| Arc::new(RestShardClient::new(self.http.clone(), shard.base_url.clone())))
                         .clone();
        client
    }
}
