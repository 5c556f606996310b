pub mod reactor;
pub mod window_host;
pub mod workspace;

pub use reactor::ScreenChangeReactor;
pub use window_host::create_window_host;
pub use workspace::Workspace;
