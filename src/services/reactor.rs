use crate::config::Config;
use crate::error::Result;
use crate::events::{Rect, WindowId, WindowInfo};
use crate::placement::{plan, Placement};
use crate::presets::PresetTable;
use crate::services::workspace::{Subscription, Workspace};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Реагирует на смену монитора окнами целевого приложения и подгоняет их
/// под геометрию пресета.
///
/// Responsibilities (strict):
/// - Register an output-change listener once per eligible window.
/// - Decide via `placement::plan` and apply the result through the host.
/// - Do NOT re-check windows that failed eligibility.
pub struct ScreenChangeReactor {
    target: String,
    presets: Arc<PresetTable>,
    tracked: Mutex<HashMap<WindowId, Subscription>>,
    lifecycle: Mutex<Vec<Subscription>>,
}

impl ScreenChangeReactor {
    pub fn new(config: &Config, presets: Arc<PresetTable>) -> Self {
        info!(
            "Инициализация ScreenChangeReactor для приложения '{}'",
            config.target.resource_name
        );
        Self {
            target: config.target.resource_name.clone(),
            presets,
            tracked: Mutex::new(HashMap::new()),
            lifecycle: Mutex::new(Vec::new()),
        }
    }

    /// Регистрирует текущие окна (в порядке наложения) и подписывается на новые
    pub fn install(self: &Arc<Self>, workspace: &Workspace) -> Result<()> {
        for window in workspace.stacking_order()? {
            self.track_if_target(workspace, &window);
        }

        // Слабые ссылки: реестр не должен продлевать жизнь реактора
        let weak = Arc::downgrade(self);
        let added = workspace.connect_window_added(Arc::new(move |ws: &Workspace, window: &WindowInfo| {
            if let Some(reactor) = weak.upgrade() {
                reactor.track_if_target(ws, window);
            }
        }));

        let weak = Arc::downgrade(self);
        let removed = workspace.connect_window_removed(Arc::new(move |_: &Workspace, id: &WindowId| {
            if let Some(reactor) = weak.upgrade() {
                reactor.forget(id);
            }
        }));

        self.lifecycle.lock().extend([added, removed]);
        Ok(())
    }

    pub fn is_target(&self, window: &WindowInfo) -> bool {
        window.resource_name == self.target
    }

    pub fn is_tracked(&self, id: &WindowId) -> bool {
        self.tracked.lock().contains_key(id)
    }

    fn track_if_target(self: &Arc<Self>, workspace: &Workspace, window: &WindowInfo) {
        if !self.is_target(window) || self.is_tracked(&window.internal_id) {
            return;
        }

        info!("Отслеживаем окно {}", window.internal_id);
        let weak: Weak<Self> = Arc::downgrade(self);
        let subscription = workspace.connect_output_changed(
            &window.internal_id,
            Arc::new(move |ws: &Workspace, window: &WindowInfo| {
                if let Some(reactor) = weak.upgrade() {
                    reactor.on_output_changed(ws, window);
                }
            }),
        );
        self.tracked
            .lock()
            .entry(window.internal_id.clone())
            .or_insert(subscription);
    }

    fn forget(&self, id: &WindowId) {
        let subscription = self.tracked.lock().remove(id);
        if subscription.is_some() {
            debug!("Окно {} закрыто, прекращаем отслеживание", id);
        }
    }

    /// Реакция на смену монитора. Возвращает применённую рамку, если она была записана.
    pub fn on_output_changed(&self, workspace: &Workspace, window: &WindowInfo) -> Option<Rect> {
        info!("Окно {} сменило монитор", window.internal_id);
        info!("Текущий монитор: {}", window.output);

        match plan(window, &self.presets) {
            Placement::Resize { preset, frame } => {
                info!("Разрешение экрана: {}", preset);
                info!("Изменяем геометрию окна {} на {}", window.internal_id, frame);
                match workspace.host().set_frame_geometry(&window.internal_id, frame) {
                    Ok(()) => Some(frame),
                    Err(e) => {
                        warn!("Не удалось изменить геометрию окна {}: {}", window.internal_id, e);
                        None
                    }
                }
            }
            skip => {
                info!("Окно {}: {}; пропускаем", window.internal_id, skip);
                None
            }
        }
    }
}

impl Drop for ScreenChangeReactor {
    fn drop(&mut self) {
        info!("ScreenChangeReactor завершает работу");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Screen, WindowEvent};
    use crate::services::window_host::{DryRunHost, WindowHost};

    struct Fixture {
        host: Arc<DryRunHost>,
        workspace: Workspace,
        reactor: Arc<ScreenChangeReactor>,
    }

    fn screens() -> Vec<Screen> {
        vec![
            Screen::new("DP-1", Rect::new(0, 0, 2560, 1440)),
            Screen::new("HDMI-1", Rect::new(2560, 0, 1920, 1080)),
            Screen::new("LVDS-1", Rect::new(4480, 0, 1366, 768)),
        ]
    }

    fn fixture(prepare: impl FnOnce(&DryRunHost)) -> Fixture {
        let config = Arc::new(Config::default());
        let host = Arc::new(DryRunHost::with_screens(config.clone(), screens()));
        prepare(host.as_ref());
        let workspace = Workspace::new(host.clone());
        let reactor = Arc::new(ScreenChangeReactor::new(
            &config,
            Arc::new(PresetTable::from_config(&config.presets)),
        ));
        reactor.install(&workspace).unwrap();
        Fixture { host, workspace, reactor }
    }

    fn frame(host: &DryRunHost, id: &WindowId) -> Rect {
        host.window(id).unwrap().unwrap().frame_geometry
    }

    /// Перенос окна хостом и доставка уведомления
    fn hop(f: &Fixture, id: &WindowId, screen: &str) {
        assert!(f.host.move_to_screen(id, screen));
        f.workspace.dispatch(&WindowEvent::OutputChanged(id.clone()));
    }

    #[tokio::test]
    async fn test_window_created_between_install_and_run_is_tracked() {
        let mut config = Config::default();
        config.host.dry_run_hop_interval_ms = 60_000;
        let config = Arc::new(config);
        let host = Arc::new(DryRunHost::with_screens(config.clone(), screens()));
        let workspace = Arc::new(Workspace::new(host.clone()));
        let reactor = Arc::new(ScreenChangeReactor::new(
            &config,
            Arc::new(PresetTable::from_config(&config.presets)),
        ));
        reactor.install(&workspace).unwrap();

        let late = host.add_window("librewolf", Rect::new(10, 10, 800, 600));
        let runner = workspace.clone();
        let handle = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        handle.abort();

        assert!(reactor.is_tracked(&late));
        assert_eq!(workspace.output_listener_count(&late), 1);
    }

    #[test]
    fn test_existing_target_windows_are_tracked() {
        let mut ids = Vec::new();
        let f = fixture(|host| {
            ids.push(host.add_window("librewolf", Rect::new(10, 10, 800, 600)));
            ids.push(host.add_window("konsole", Rect::new(10, 10, 800, 600)));
        });

        assert!(f.reactor.is_tracked(&ids[0]));
        assert!(!f.reactor.is_tracked(&ids[1]));
        assert_eq!(f.workspace.output_listener_count(&ids[0]), 1);
        assert_eq!(f.workspace.output_listener_count(&ids[1]), 0);
    }

    #[test]
    fn test_moving_to_full_hd_resizes() {
        let mut id = None;
        let f = fixture(|host| id = Some(host.add_window("librewolf", Rect::new(10, 10, 800, 600))));
        let id = id.unwrap();

        hop(&f, &id, "HDMI-1");
        assert_eq!(frame(&f.host, &id), Rect::new(2720, 30, 1600, 1019));

        hop(&f, &id, "DP-1");
        assert_eq!(frame(&f.host, &id), Rect::new(280, 110, 2000, 1219));
    }

    #[test]
    fn test_unrecognized_resolution_leaves_window_alone() {
        let mut id = None;
        let f = fixture(|host| id = Some(host.add_window("librewolf", Rect::new(10, 10, 800, 600))));
        let id = id.unwrap();

        hop(&f, &id, "LVDS-1");
        assert_eq!(frame(&f.host, &id), Rect::new(4490, 10, 800, 600));
    }

    #[test]
    fn test_full_screen_and_maximized_are_not_touched() {
        let mut ids = Vec::new();
        let f = fixture(|host| {
            ids.push(host.add_window("librewolf", Rect::new(10, 10, 800, 600)));
            ids.push(host.add_window("librewolf", Rect::new(20, 20, 800, 600)));
        });
        f.host.update(&ids[0], |w| w.full_screen = true);
        f.host.update(&ids[1], |w| w.maximize_mode = 3);

        hop(&f, &ids[0], "HDMI-1");
        hop(&f, &ids[1], "HDMI-1");
        assert_eq!(frame(&f.host, &ids[0]), Rect::new(2570, 10, 800, 600));
        assert_eq!(frame(&f.host, &ids[1]), Rect::new(2580, 20, 800, 600));
    }

    #[test]
    fn test_added_windows_are_tracked_by_resource_name() {
        let f = fixture(|_| {});

        let browser = f.host.add_window("librewolf", Rect::new(0, 0, 640, 480));
        let terminal = f.host.add_window("konsole", Rect::new(0, 0, 640, 480));
        for id in [&browser, &terminal] {
            let window = f.host.window(id).unwrap().unwrap();
            f.workspace.dispatch(&WindowEvent::Added(window));
        }
        assert!(f.reactor.is_tracked(&browser));
        assert!(!f.reactor.is_tracked(&terminal));

        // Даже если окно позже "стало" подходящим, повторной проверки нет
        f.host.update(&terminal, |w| w.resource_name = "librewolf".to_string());
        hop(&f, &terminal, "HDMI-1");
        assert_eq!(frame(&f.host, &terminal), Rect::new(2560, 0, 640, 480));
        assert!(!f.reactor.is_tracked(&terminal));
    }

    #[test]
    fn test_duplicate_added_does_not_register_twice() {
        let mut id = None;
        let f = fixture(|host| id = Some(host.add_window("librewolf", Rect::new(0, 0, 640, 480))));
        let id = id.unwrap();

        let window = f.host.window(&id).unwrap().unwrap();
        f.workspace.dispatch(&WindowEvent::Added(window));
        assert_eq!(f.workspace.output_listener_count(&id), 1);
    }

    #[test]
    fn test_removed_window_is_forgotten() {
        let mut id = None;
        let f = fixture(|host| id = Some(host.add_window("librewolf", Rect::new(0, 0, 640, 480))));
        let id = id.unwrap();

        f.host.remove_window(&id);
        f.workspace.dispatch(&WindowEvent::Removed(id.clone()));
        assert!(!f.reactor.is_tracked(&id));
        assert_eq!(f.workspace.output_listener_count(&id), 0);
    }

    #[test]
    fn test_reaction_is_idempotent() {
        let mut id = None;
        let f = fixture(|host| id = Some(host.add_window("librewolf", Rect::new(2600, 40, 800, 600))));
        let id = id.unwrap();

        let window = f.host.window(&id).unwrap().unwrap();
        let first = f.reactor.on_output_changed(&f.workspace, &window);
        let window = f.host.window(&id).unwrap().unwrap();
        let second = f.reactor.on_output_changed(&f.workspace, &window);
        assert_eq!(first, Some(Rect::new(2720, 30, 1600, 1019)));
        assert_eq!(first, second);
    }
}
