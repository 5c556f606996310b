use super::r#trait::WindowHost;
use crate::config::Config;
use crate::error::Result;
use crate::events::{Rect, Screen, WindowEvent, WindowId, WindowInfo};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::info;

/// Эмуляция рабочего стола в памяти: окна "перепрыгивают" между мониторами
pub struct DryRunHost {
    config: Arc<Config>,
    state: Mutex<DesktopState>,
}

#[derive(Debug, Default)]
struct DesktopState {
    screens: Vec<Screen>,
    /// В порядке наложения
    windows: Vec<WindowInfo>,
    next_id: u32,
}

impl DesktopState {
    fn find_mut(&mut self, id: &WindowId) -> Option<&mut WindowInfo> {
        self.windows.iter_mut().find(|w| &w.internal_id == id)
    }

    fn allocate_id(&mut self) -> WindowId {
        self.next_id += 1;
        WindowId::new(format!("dry-{:02}", self.next_id))
    }
}

impl DryRunHost {
    pub fn new(config: Arc<Config>) -> Self {
        let screens = vec![
            Screen::new("DP-1", Rect::new(0, 0, 2560, 1440)),
            Screen::new("HDMI-1", Rect::new(2560, 0, 1920, 1080)),
        ];
        let target = config.target.resource_name.clone();

        let host = Self::with_screens(config, screens.clone());
        host.add_window(&target, Rect::new(100, 100, 1200, 800));
        host.add_window("konsole", Rect::new(300, 200, 900, 600));
        let full_screen = host.add_window(&target, screens[1].geometry);
        host.update(&full_screen, |w| w.full_screen = true);
        host
    }

    /// Пустой рабочий стол с заданными мониторами
    pub fn with_screens(config: Arc<Config>, screens: Vec<Screen>) -> Self {
        Self {
            config,
            state: Mutex::new(DesktopState {
                screens,
                ..Default::default()
            }),
        }
    }

    /// Создаёт окно поверх остальных и возвращает его идентификатор
    pub fn add_window(&self, resource_name: &str, frame: Rect) -> WindowId {
        let mut state = self.state.lock();
        let id = state.allocate_id();
        let output = Screen::containing(&state.screens, &frame)
            .cloned()
            .unwrap_or_else(|| Screen::new("none", Rect::default()));
        state
            .windows
            .push(WindowInfo::new(id.clone(), resource_name, output, frame));
        id
    }

    #[allow(dead_code)]
    pub fn remove_window(&self, id: &WindowId) -> bool {
        let mut state = self.state.lock();
        let before = state.windows.len();
        state.windows.retain(|w| &w.internal_id != id);
        state.windows.len() != before
    }

    /// Изменяет снимок окна (полноэкранный режим, развёрнутость и т.п.)
    pub fn update(&self, id: &WindowId, change: impl FnOnce(&mut WindowInfo)) -> bool {
        let mut state = self.state.lock();
        match state.find_mut(id) {
            Some(window) => {
                change(window);
                true
            }
            None => false,
        }
    }

    /// Переносит окно на монитор с тем же относительным смещением.
    /// Возвращает `true`, если монитор окна действительно сменился.
    pub fn move_to_screen(&self, id: &WindowId, screen_name: &str) -> bool {
        let mut state = self.state.lock();
        let Some(target) = state.screens.iter().find(|s| s.name == screen_name).cloned() else {
            return false;
        };
        let Some(window) = state.find_mut(id) else {
            return false;
        };
        if window.output.name == target.name {
            return false;
        }

        let frame = &mut window.frame_geometry;
        frame.x = target.geometry.x + (frame.x - window.output.geometry.x);
        frame.y = target.geometry.y + (frame.y - window.output.geometry.y);
        window.output = target;
        true
    }

    /// Следующий шаг эмуляции: первое подходящее окно уходит на соседний монитор
    fn hop(&self) -> Option<WindowId> {
        let (id, next_screen) = {
            let state = self.state.lock();
            if state.screens.is_empty() {
                return None;
            }
            let window = state.windows.iter().find(|w| {
                w.resource_name == self.config.target.resource_name && !w.full_screen
            })?;
            let current = state
                .screens
                .iter()
                .position(|s| s.name == window.output.name)
                .unwrap_or(0);
            let next = state.screens.get((current + 1) % state.screens.len())?;
            (window.internal_id.clone(), next.name.clone())
        };

        self.move_to_screen(&id, &next_screen).then_some(id)
    }
}

#[async_trait::async_trait]
impl WindowHost for DryRunHost {
    fn stacking_order(&self) -> Result<Vec<WindowInfo>> {
        Ok(self.state.lock().windows.clone())
    }

    fn window(&self, id: &WindowId) -> Result<Option<WindowInfo>> {
        Ok(self
            .state
            .lock()
            .windows
            .iter()
            .find(|w| &w.internal_id == id)
            .cloned())
    }

    fn set_frame_geometry(&self, id: &WindowId, geometry: Rect) -> Result<()> {
        if self.update(id, |w| w.frame_geometry = geometry) {
            info!("Dry-run: окно {} -> {}", id, geometry);
        }
        Ok(())
    }

    async fn watch(&self, known: HashSet<WindowId>, events: mpsc::Sender<WindowEvent>) -> Result<()> {
        info!("Dry-run режим - WindowHost работает в режиме эмуляции");

        // Окна, созданные между перечислением и запуском наблюдения
        for window in self.stacking_order()? {
            if !known.contains(&window.internal_id) && events.send(WindowEvent::Added(window)).await.is_err() {
                return Ok(());
            }
        }

        let mut ticker = interval(Duration::from_millis(self.config.host.dry_run_hop_interval_ms));
        // Первый тик срабатывает сразу
        ticker.tick().await;

        loop {
            ticker.tick().await;

            if let Some(id) = self.hop() {
                info!("Dry-run: эмулируем переход окна {} на другой монитор", id);
                if events.send(WindowEvent::OutputChanged(id)).await.is_err() {
                    return Ok(());
                }
            }
        }
    }
}
