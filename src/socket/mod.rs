//! Stream socket lifecycle.
//!
//! Every socket moves through typestates:
//! `RawSocket` → `BoundSocket` → `Listener` on the server side,
//! `RawSocket` → `ConnectedStream` / `PendingConnect` on the client side.
//! Each state owns its descriptor, so a failure at any step closes it.

mod listener;
mod raw;
mod stream;
mod options;
mod bound;
mod builder;
mod pending;
mod resolve;

pub(crate) use self::listener::accept_on;
pub(crate) use self::raw::RawSocket;

pub use self::listener::Listener;
pub use self::stream::ConnectedStream;
pub use self::pending::PendingConnect;
pub use self::options::{set_reuse_addr, set_nonblocking, take_error, check_pending_error};
pub use self::builder::{ListenerBuilder, ConnectorBuilder};

/*
---
  The lifecycle:
  ┌─────────────────┬──────────────────────────┬──────────────────────────────┐
  │      State      │      Reached through     │          Leaves via          │
  ├─────────────────┼──────────────────────────┼──────────────────────────────┤
  │ RawSocket       │ socket()                 │ bind() / connect()           │
  │ BoundSocket     │ bind()                   │ listen()                     │
  │ Listener        │ listen()                 │ accept() → ConnectedStream   │
  │ PendingConnect  │ non-blocking connect()   │ finish() → ConnectedStream   │
  │ ConnectedStream │ connect() / accept()     │ drop / transfer::close()     │
  └─────────────────┴──────────────────────────┴──────────────────────────────┘
---
*/
