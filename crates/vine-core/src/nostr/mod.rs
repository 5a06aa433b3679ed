pub mod client;
pub mod identity;
pub mod memory;
pub mod pool;

pub use client::{to_nostr_filter, NostrRelayPool};
pub use identity::{Identity, IdentityError, KeysIdentity, UnsignedEvent};
pub use memory::MemoryRelayPool;
pub use pool::{RelayError, RelayPool, Subscription, SubscriptionState};
