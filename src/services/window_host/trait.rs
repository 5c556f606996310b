use crate::config::Config;
use crate::error::Result;
use crate::events::{Rect, WindowEvent, WindowId, WindowInfo};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Контракт хоста оконного менеджера: чтение окон, запись геометрии
/// и поток уведомлений о жизненном цикле окон.
#[async_trait::async_trait]
pub trait WindowHost: Send + Sync {
    /// Открытые окна в текущем порядке наложения
    fn stacking_order(&self) -> Result<Vec<WindowInfo>>;

    /// Свежий снимок окна; `None`, если окно уже закрыто
    fn window(&self, id: &WindowId) -> Result<Option<WindowInfo>>;

    /// Запрос на перемещение/изменение размера окна одной записью
    fn set_frame_geometry(&self, id: &WindowId, geometry: Rect) -> Result<()>;

    /// Отслеживает изменения и отправляет события до закрытия канала.
    /// Окна из `known` уже объявлены и не отправляются как `Added`.
    async fn watch(&self, known: HashSet<WindowId>, events: mpsc::Sender<WindowEvent>) -> Result<()>;
}

/// Factory function to create an appropriate window host based on the dry_run flag
pub fn create_window_host(config: Arc<Config>, dry_run: bool) -> Result<Arc<dyn WindowHost>> {
    if dry_run {
        Ok(Arc::new(super::DryRunHost::new(config)))
    } else {
        Ok(Arc::new(super::x11::X11Host::new(config)?))
    }
}
