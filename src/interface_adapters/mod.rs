// Interface adapters: wire protocol, outbound clients and local persistence.

pub mod clients;
pub mod local_store;
pub mod notifier;
pub mod protocol;
pub mod system;
