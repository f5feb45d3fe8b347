//! Adapters: concrete implementations of the port and callback traits.
//!
//! | Adapter         | Implements       | Connects to                 |
//! |-----------------|------------------|-----------------------------|
//! | `timer`         | TimeoutPort      | one thread, async-io-mini   |
//! | `log_callbacks` | ConnectCallback  | `log` facade                |
//!
//! Radio-stack adapters ([`Transport`](crate::ports::Transport),
//! [`RadioPort`](crate::ports::RadioPort)) live with the platform
//! integration, outside this crate.

pub mod log_callbacks;
pub mod timer;
