//! Contains the building blocks the registry is assembled from.
//!
//! This module provides the listener callback handle and binding record, the
//! ordering engine that turns a set of bindings into an execution order, and
//! lazy subscriptions layered on top of the bus.

pub mod listener;
pub mod ordering;
pub mod subscription;
