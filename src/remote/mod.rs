// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Remote collaborators: broker, cloud database and chat bot
//!
//! Each collaborator is split into a publishing side (shared, `&self`) and a
//! subscribing side (owned by one listener task, `&mut self`). The concrete
//! implementations here are in-process channel pairs; a networked variant
//! only has to implement the same traits.

pub mod broker;
pub mod chat;
pub mod cloud;

pub use broker::{BrokerLink, BrokerPublisher, BrokerSubscriber, PublishedMessage};
pub use chat::{ChatLink, ChatRequest, ChatTransport};
pub use cloud::{CloudLink, CloudSubscriber, CloudWriter, HistoryRecord, StatusRecord};
