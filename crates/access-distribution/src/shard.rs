//! Configuración de shards y resolución por rango de hash.
//!
//! Para cada par `(elemento de datos, tipo de operación)` hay una lista de
//! `(hash_range_start, configuración de cliente)` ordenada ascendente. El
//! shard dueño de una clave es la entrada con el mayor `hash_range_start`
//! menor o igual a `hash(clave)`; por eso la primera entrada debe arrancar
//! en `i32::MIN` para cubrir todo el espacio.
//!
//! El set es inmutable: la reconfiguración reemplaza el snapshot completo
//! de forma atómica (ver `ShardRouter`), y las operaciones en vuelo
//! terminan contra el snapshot viejo.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use access_core::hashing::fnv1a_32;

use crate::error::DistributionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataElement {
    User,
    Group,
    GroupToGroup,
}

impl fmt::Display for DataElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataElement::User => "user",
            DataElement::Group => "group",
            DataElement::GroupToGroup => "groupToGroup",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationType {
    Query,
    Event,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationType::Query => "query",
            OperationType::Event => "event",
        };
        write!(f, "{name}")
    }
}

/// Un shard: inicio (inclusivo) de su rango de hash y la base del cliente.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfig {
    pub hash_range_start: i32,
    pub base_url: String,
}

impl ShardConfig {
    /// Descripción identificatoria para anotar errores y logs.
    pub fn describe(&self, include_hash_range: bool) -> String {
        if include_hash_range {
            format!("{} (hash range start {})", self.base_url, self.hash_range_start)
        } else {
            self.base_url.clone()
        }
    }
}

pub struct ShardConfigSet {
    entries: BTreeMap<(DataElement, OperationType), Vec<ShardConfig>>,
}

impl ShardConfigSet {
    /// Construye el set validando cada lista: no vacía, primera entrada en
    /// `i32::MIN` (cobertura total) y starts estrictamente ascendentes.
    pub fn from_entries(entries: Vec<(DataElement, OperationType, Vec<ShardConfig>)>)
                        -> Result<Self, DistributionError> {
        let mut map = BTreeMap::new();
        for (element, operation, mut shards) in entries {
            if shards.is_empty() {
                return Err(DistributionError::InvalidConfiguration(format!("empty shard list for {element}/{operation}")));
            }
            shards.sort_by_key(|s| s.hash_range_start);
            if shards[0].hash_range_start != i32::MIN {
                return Err(DistributionError::InvalidConfiguration(format!(
                    "first hash range for {element}/{operation} must start at i32::MIN"
                )));
            }
            if shards.windows(2).any(|w| w[0].hash_range_start == w[1].hash_range_start) {
                return Err(DistributionError::InvalidConfiguration(format!(
                    "duplicate hash range start for {element}/{operation}"
                )));
            }
            map.insert((element, operation), shards);
        }
        Ok(ShardConfigSet { entries: map })
    }

    fn list(&self, element: DataElement, operation: OperationType) -> Result<&[ShardConfig], DistributionError> {
        self.entries
            .get(&(element, operation))
            .map(Vec::as_slice)
            .ok_or_else(|| DistributionError::NoShardConfigured { element: element.to_string(),
                                                                  operation: operation.to_string() })
    }

    /// Shard dueño del hash: la entrada con el mayor start ≤ hash.
    pub fn shard_for(&self,
                     element: DataElement,
                     operation: OperationType,
                     hash: i32)
                     -> Result<&ShardConfig, DistributionError> {
        let shards = self.list(element, operation)?;
        let position = shards.partition_point(|s| s.hash_range_start <= hash);
        // position >= 1 siempre: la primera entrada arranca en i32::MIN.
        Ok(&shards[position - 1])
    }

    /// Todos los shards de un par, para broadcasts.
    pub fn shards(&self, element: DataElement, operation: OperationType) -> Result<&[ShardConfig], DistributionError> {
        self.list(element, operation)
    }

    /// Agrupa claves por shard dueño (hash FNV-1a de la forma string).
    /// Sólo aparecen los shards que poseen al menos una clave.
    pub fn partition(&self,
                     element: DataElement,
                     operation: OperationType,
                     keys: &BTreeSet<String>)
                     -> Result<Vec<(&ShardConfig, BTreeSet<String>)>, DistributionError> {
        let mut by_shard: BTreeMap<i32, (&ShardConfig, BTreeSet<String>)> = BTreeMap::new();
        for key in keys {
            let shard = self.shard_for(element, operation, fnv1a_32(key))?;
            by_shard.entry(shard.hash_range_start)
                    .or_insert_with(|| (shard, BTreeSet::new()))
                    .1
                    .insert(key.clone());
        }
        Ok(by_shard.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard(start: i32, url: &str) -> ShardConfig {
        ShardConfig { hash_range_start: start, base_url: url.to_string() }
    }

    fn set_of(shards: Vec<ShardConfig>) -> ShardConfigSet {
        ShardConfigSet::from_entries(vec![(DataElement::Group, OperationType::Query, shards)]).unwrap()
    }

    #[test]
    fn owner_is_greatest_start_at_or_below_hash() {
        let set = set_of(vec![shard(i32::MIN, "a"), shard(0, "b"), shard(1000, "c")]);
        assert_eq!(set.shard_for(DataElement::Group, OperationType::Query, -5).unwrap().base_url, "a");
        assert_eq!(set.shard_for(DataElement::Group, OperationType::Query, 0).unwrap().base_url, "b");
        assert_eq!(set.shard_for(DataElement::Group, OperationType::Query, 999).unwrap().base_url, "b");
        assert_eq!(set.shard_for(DataElement::Group, OperationType::Query, i32::MAX).unwrap().base_url, "c");
    }

    #[test]
    fn configuration_must_cover_full_range() {
        let err = ShardConfigSet::from_entries(vec![(DataElement::User, OperationType::Event, vec![shard(0, "x")])]);
        assert!(matches!(err, Err(DistributionError::InvalidConfiguration(_))));
    }

    #[test]
    fn partition_only_contacts_owning_shards() {
        let set = set_of(vec![shard(i32::MIN, "a"), shard(0, "b")]);
        let keys: BTreeSet<String> = ["g1", "g2", "g3"].iter().map(|s| s.to_string()).collect();
        let partitions = set.partition(DataElement::Group, OperationType::Query, &keys).unwrap();
        let total: usize = partitions.iter().map(|(_, k)| k.len()).sum();
        assert_eq!(total, keys.len());
        for (shard, subset) in partitions {
            for key in subset {
                assert_eq!(set.shard_for(DataElement::Group, OperationType::Query, fnv1a_32(&key))
                              .unwrap()
                              .base_url,
                           shard.base_url);
            }
        }
    }

    #[test]
    fn unconfigured_pair_is_an_error() {
        let set = set_of(vec![shard(i32::MIN, "a")]);
        assert!(matches!(set.shard_for(DataElement::User, OperationType::Event, 7),
                         Err(DistributionError::NoShardConfigured { .. })));
    }
}
