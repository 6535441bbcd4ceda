//! Cluster topology manager.
//!
//! Discovers brokers from seed URIs, caches per-topic partition metadata,
//! tracks partition leaders, and hands out connected broker sessions. The
//! snapshot is rebuilt whole from a single metadata response and replaced
//! atomically, so readers see the old topology or the new one, never a blend.

use std::collections::{HashMap, HashSet};

use frz_protocol::{KafkaCode, MetadataResponse};
use tracing::{debug, info, warn};

use crate::config::{BrokerUri, ClusterConfig};
use crate::connection::BrokerConnection;
use crate::error::{ClientError, Result};
use crate::pool::BrokerPool;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerInfo {
    pub node_id: i32,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
struct PartitionInfo {
    error: KafkaCode,
    leader: i32,
    #[allow(dead_code)]
    replicas: Vec<i32>,
    isr: Vec<i32>,
}

#[derive(Debug, Clone)]
struct TopicInfo {
    error: KafkaCode,
    partitions: HashMap<i32, PartitionInfo>,
}

#[derive(Debug, Clone)]
struct TopologySnapshot {
    brokers: HashMap<i32, BrokerInfo>,
    topics: HashMap<String, TopicInfo>,
    controller_id: i32,
}

impl TopologySnapshot {
    fn from_response(response: MetadataResponse) -> Self {
        let brokers = response
            .brokers
            .into_iter()
            .map(|b| {
                (
                    b.node_id,
                    BrokerInfo {
                        node_id: b.node_id,
                        host: b.host,
                        port: b.port as u16,
                    },
                )
            })
            .collect();
        let topics = response
            .topics
            .into_iter()
            .map(|t| {
                let partitions = t
                    .partitions
                    .into_iter()
                    .map(|p| {
                        (
                            p.partition,
                            PartitionInfo {
                                error: p.error,
                                leader: p.leader,
                                replicas: p.replicas,
                                isr: p.isr,
                            },
                        )
                    })
                    .collect();
                (
                    t.topic,
                    TopicInfo {
                        error: t.error,
                        partitions,
                    },
                )
            })
            .collect();
        Self {
            brokers,
            topics,
            controller_id: response.controller_id,
        }
    }
}

/// Metadata cache plus the broker pool that serves its endpoints.
#[derive(Debug)]
pub struct Cluster {
    seeds: Vec<BrokerUri>,
    pool: BrokerPool,
    topology: Option<TopologySnapshot>,
    target_topics: HashSet<String>,
    stale: bool,
}

impl Cluster {
    /// Parses the seed URIs eagerly, so a malformed seed fails construction
    /// rather than the first delivery.
    pub fn new(config: ClusterConfig) -> Result<Self> {
        let seeds = config
            .seed_brokers
            .iter()
            .map(|uri| BrokerUri::parse(uri))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            seeds,
            pool: BrokerPool::new(
                config.client_id,
                config.connect_timeout,
                config.socket_timeout,
            ),
            topology: None,
            target_topics: HashSet::new(),
            stale: true,
        })
    }

    /// Adds topics to the set every metadata request asks about.
    pub fn add_target_topics<I, S>(&mut self, topics: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for topic in topics {
            self.target_topics.insert(topic.into());
        }
    }

    /// Flags the snapshot as unusable; the next query refreshes first.
    pub fn mark_as_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn controller_id(&self) -> Option<i32> {
        self.topology.as_ref().map(|t| t.controller_id)
    }

    /// Refreshes when the snapshot is dirty or a target topic is missing
    /// from it.
    pub async fn refresh_metadata_if_necessary(&mut self) -> Result<()> {
        let missing_topic = match &self.topology {
            None => true,
            Some(snapshot) => self
                .target_topics
                .iter()
                .any(|topic| !snapshot.topics.contains_key(topic)),
        };
        if self.stale || missing_topic {
            self.refresh_metadata().await?;
        }
        Ok(())
    }

    /// Fetches fresh metadata from the first seed broker that answers and
    /// replaces the snapshot atomically.
    pub async fn refresh_metadata(&mut self) -> Result<()> {
        let topics: Vec<String> = self.target_topics.iter().cloned().collect();

        for seed in &self.seeds {
            let connection = match self.pool.connect(&seed.host, seed.port).await {
                Ok(connection) => connection,
                Err(e) => {
                    warn!(seed = %seed, error = %e, "seed broker unreachable");
                    continue;
                }
            };
            match connection.topic_metadata(&topics).await {
                Ok(response) => {
                    let snapshot = TopologySnapshot::from_response(response);
                    info!(
                        brokers = snapshot.brokers.len(),
                        topics = snapshot.topics.len(),
                        controller = snapshot.controller_id,
                        "refreshed cluster metadata"
                    );
                    self.topology = Some(snapshot);
                    self.stale = false;
                    return Ok(());
                }
                Err(e) => {
                    warn!(seed = %seed, error = %e, "metadata request to seed failed");
                    self.pool.drop_connection(&seed.host, seed.port);
                }
            }
        }

        Err(ClientError::ConnectionFailed(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "could not connect to any seed broker",
        )))
    }

    /// Partition ids of a topic, refreshing once when the topic is absent
    /// from the snapshot.
    pub async fn partitions_for(&mut self, topic: &str) -> Result<Vec<i32>> {
        self.add_target_topics([topic]);
        self.refresh_metadata_if_necessary().await?;
        if let Some(partitions) = self.lookup_partitions(topic)? {
            return Ok(partitions);
        }
        self.refresh_metadata().await?;
        self.lookup_partitions(topic)?
            .ok_or(ClientError::Kafka(KafkaCode::UnknownTopicOrPartition))
    }

    /// Node id of the partition's leader, refreshing once on a miss.
    pub async fn leader_id(&mut self, topic: &str, partition: i32) -> Result<i32> {
        self.add_target_topics([topic]);
        self.refresh_metadata_if_necessary().await?;
        if let Some(leader) = self.lookup_leader(topic, partition)? {
            return Ok(leader);
        }
        self.refresh_metadata().await?;
        self.lookup_leader(topic, partition)?
            .ok_or(ClientError::Kafka(KafkaCode::UnknownTopicOrPartition))
    }

    /// Connected session to the leader of `(topic, partition)`.
    pub async fn get_leader(&mut self, topic: &str, partition: i32) -> Result<&mut BrokerConnection> {
        let node_id = self.leader_id(topic, partition).await?;
        self.broker(node_id).await
    }

    /// Connected session to a broker by node id.
    pub async fn broker(&mut self, node_id: i32) -> Result<&mut BrokerConnection> {
        let info = self
            .topology
            .as_ref()
            .and_then(|t| t.brokers.get(&node_id))
            .cloned();
        match info {
            Some(info) => self.pool.connect(&info.host, info.port).await,
            None => {
                // The snapshot references a node it no longer describes.
                self.stale = true;
                Err(ClientError::Kafka(KafkaCode::LeaderNotAvailable))
            }
        }
    }

    /// Drops the pooled connection to a broker after a transport failure so
    /// the next use reconnects.
    pub fn evict_broker(&mut self, node_id: i32) {
        if let Some(info) = self.topology.as_ref().and_then(|t| t.brokers.get(&node_id)) {
            let (host, port) = (info.host.clone(), info.port);
            self.pool.drop_connection(&host, port);
        }
    }

    /// In-sync replica count for a partition, when known.
    pub fn isr_for(&self, topic: &str, partition: i32) -> Option<usize> {
        self.topology
            .as_ref()
            .and_then(|t| t.topics.get(topic))
            .and_then(|t| t.partitions.get(&partition))
            .map(|p| p.isr.len())
    }

    /// Closes the pool and discards the snapshot.
    pub fn disconnect(&mut self) {
        debug!("disconnecting cluster");
        self.pool.close_all();
        self.topology = None;
        self.stale = true;
    }

    fn lookup_partitions(&self, topic: &str) -> Result<Option<Vec<i32>>> {
        let Some(info) = self.topology.as_ref().and_then(|t| t.topics.get(topic)) else {
            return Ok(None);
        };
        check_topic_error(topic, info.error)?;
        let mut partitions: Vec<i32> = info.partitions.keys().copied().collect();
        partitions.sort_unstable();
        Ok(Some(partitions))
    }

    fn lookup_leader(&self, topic: &str, partition: i32) -> Result<Option<i32>> {
        let Some(info) = self.topology.as_ref().and_then(|t| t.topics.get(topic)) else {
            return Ok(None);
        };
        check_topic_error(topic, info.error)?;
        let Some(partition_info) = info.partitions.get(&partition) else {
            return Ok(None);
        };
        match partition_info.error {
            KafkaCode::None => {}
            KafkaCode::LeaderNotAvailable => {
                return Err(ClientError::Kafka(KafkaCode::LeaderNotAvailable))
            }
            code => return Err(ClientError::Kafka(code)),
        }
        if partition_info.leader < 0 {
            return Err(ClientError::Kafka(KafkaCode::LeaderNotAvailable));
        }
        Ok(Some(partition_info.leader))
    }
}

fn check_topic_error(topic: &str, error: KafkaCode) -> Result<()> {
    match error {
        KafkaCode::None => Ok(()),
        KafkaCode::InvalidTopic => {
            warn!(topic, "topic flagged invalid by broker");
            Err(ClientError::Kafka(KafkaCode::InvalidTopic))
        }
        code => Err(ClientError::Kafka(code)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use frz_protocol::{BrokerMetadata, PartitionMetadata, TopicMetadata};

    fn response() -> MetadataResponse {
        MetadataResponse {
            brokers: vec![BrokerMetadata {
                node_id: 1,
                host: "kafka1".into(),
                port: 9092,
                rack: None,
            }],
            controller_id: 1,
            topics: vec![TopicMetadata {
                error: KafkaCode::None,
                topic: "events".into(),
                is_internal: false,
                partitions: vec![
                    PartitionMetadata {
                        error: KafkaCode::None,
                        partition: 1,
                        leader: 1,
                        replicas: vec![1],
                        isr: vec![1],
                    },
                    PartitionMetadata {
                        error: KafkaCode::None,
                        partition: 0,
                        leader: 1,
                        replicas: vec![1],
                        isr: vec![1],
                    },
                ],
            }],
        }
    }

    fn cluster_with_snapshot(response: MetadataResponse) -> Cluster {
        let mut cluster =
            Cluster::new(ClusterConfig::new(["kafka://unused:9092"])).unwrap();
        cluster.topology = Some(TopologySnapshot::from_response(response));
        cluster.stale = false;
        cluster
    }

    #[test]
    fn construction_rejects_bad_seed_uri() {
        let err = Cluster::new(ClusterConfig::new(["http://kafka"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid protocol `http` in `http://kafka`"
        );
    }

    #[test]
    fn snapshot_lookup_returns_sorted_partitions() {
        let cluster = cluster_with_snapshot(response());
        let partitions = cluster.lookup_partitions("events").unwrap().unwrap();
        assert_eq!(partitions, vec![0, 1]);
    }

    #[test]
    fn snapshot_lookup_resolves_leader() {
        let cluster = cluster_with_snapshot(response());
        assert_eq!(cluster.lookup_leader("events", 0).unwrap(), Some(1));
        assert_eq!(cluster.lookup_leader("events", 9).unwrap(), None);
        assert_eq!(cluster.lookup_leader("absent", 0).unwrap(), None);
    }

    #[test]
    fn partition_error_five_surfaces_leader_not_available() {
        let mut r = response();
        r.topics[0].partitions[0].error = KafkaCode::LeaderNotAvailable;
        let cluster = cluster_with_snapshot(r);
        assert!(matches!(
            cluster.lookup_leader("events", 0).unwrap_err(),
            ClientError::Kafka(KafkaCode::LeaderNotAvailable)
        ));
    }

    #[test]
    fn negative_leader_surfaces_leader_not_available() {
        let mut r = response();
        r.topics[0].partitions[0].leader = -1;
        let cluster = cluster_with_snapshot(r);
        assert!(matches!(
            cluster.lookup_leader("events", 0).unwrap_err(),
            ClientError::Kafka(KafkaCode::LeaderNotAvailable)
        ));
    }

    #[test]
    fn topic_error_seventeen_surfaces_invalid_topic() {
        let mut r = response();
        r.topics[0].error = KafkaCode::InvalidTopic;
        let cluster = cluster_with_snapshot(r);
        assert!(matches!(
            cluster.lookup_leader("events", 0).unwrap_err(),
            ClientError::Kafka(KafkaCode::InvalidTopic)
        ));
        assert!(matches!(
            cluster.lookup_partitions("events").unwrap_err(),
            ClientError::Kafka(KafkaCode::InvalidTopic)
        ));
    }

    #[test]
    fn stale_flag_and_targets_drive_refresh_check() {
        let mut cluster = cluster_with_snapshot(response());
        assert!(!cluster.is_stale());
        cluster.mark_as_stale();
        assert!(cluster.is_stale());
        cluster.add_target_topics(["events", "audit"]);
        assert!(cluster.target_topics.contains("audit"));
    }
}
