//! Local mirror of the provisioned topology.
//!
//! This module provides:
//! - The canonical `AppTopology` record and its parts
//! - The `MirrorStore` repository trait
//! - A file-based implementation with atomic writes and a single writer

mod local;
mod store;
mod types;

pub use local::LocalMirrorStore;
pub use store::MirrorStore;
pub use types::{
    AppTopology, AuthRecord, ClientConfig, DomainRecord, EnvironmentRecord, OAuthConfig,
    ProviderMetadata, ProvisioningStage, StackRecord, SubDomain, TOPOLOGY_VERSION,
};
