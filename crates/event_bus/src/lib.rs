//! # Event Bus
//!
//! 进程内事件分发模块。
//!
//! 负责：
//! - 订阅者注册与按类型路由
//! - 发布结果缓存（订阅变更时整体失效）
//! - 有界异步队列，周期性批量派发
//! - 隔离慢 handler，不阻塞发布路径

pub mod bus;
pub mod cache;
pub mod publication;
pub mod queue;
pub mod registry;

pub use bus::EventBus;
pub use contracts::{BusEvent, DispatchOutcome, RegisteredHandler, SubscribeOptions};
pub use publication::{PublicationKind, PublicationResult};
pub use queue::DRAIN_INTERVAL;
