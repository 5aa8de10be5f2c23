//! Service discovery: the coordination-store contract, the lease-backed
//! registry, and the caching, rate-limited proxy in front of it.

pub mod balancer;
pub mod coord;
pub mod etcd;
pub mod hub;
pub mod limiter;
pub mod proxy;

pub use balancer::{LoadBalancer, RandomSelect, RoundRobin};
pub use coord::{CoordStore, MemCoordStore, WatchEvent, WatchEventKind};
pub use etcd::EtcdCoordStore;
pub use hub::{ServiceHub, ServiceRegistry, SERVICE_ROOT_PATH};
pub use limiter::TokenBucket;
pub use proxy::RegistryProxy;
