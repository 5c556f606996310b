//! WindowHost: the window manager as seen by the reactor.
//!
//! Implementations only read windows and screens, apply frame geometry and
//! report lifecycle events. Placement decisions live in the reactor.

mod dry_run;
mod x11;
mod r#trait;

pub use self::dry_run::DryRunHost;
pub use self::r#trait::{create_window_host, WindowHost};
