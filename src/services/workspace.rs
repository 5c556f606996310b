//! Workspace: registry of window listeners and the serialized event loop.
//!
//! Listeners are registered per notification kind and handed back as
//! [`Subscription`]s. Dropping (or disposing) a subscription removes the
//! listener. Events are dispatched one at a time, in arrival order.

use crate::error::Result;
use crate::events::{WindowEvent, WindowId, WindowInfo};
use crate::screen_fit_error;
use crate::services::window_host::WindowHost;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Колбэк, получающий рабочее пространство и снимок окна
pub type WindowListener = Arc<dyn Fn(&Workspace, &WindowInfo) + Send + Sync>;

/// Колбэк закрытия окна
pub type RemovedListener = Arc<dyn Fn(&Workspace, &WindowId) + Send + Sync>;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ListenerKey {
    WindowAdded(u64),
    WindowRemoved(u64),
    OutputChanged(u64),
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    window_added: Vec<(u64, WindowListener)>,
    window_removed: Vec<(u64, RemovedListener)>,
    output_changed: HashMap<WindowId, SmallVec<[(u64, WindowListener); 2]>>,
}

impl Registry {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Вынимает слушатель из реестра. Сам слушатель уничтожается
    /// вызывающим уже после снятия блокировки.
    fn take(&mut self, key: ListenerKey, window: Option<&WindowId>) -> Option<Box<dyn Any + Send>> {
        match key {
            ListenerKey::WindowAdded(id) => {
                let index = self.window_added.iter().position(|(l, _)| *l == id)?;
                Some(Box::new(self.window_added.remove(index).1))
            }
            ListenerKey::WindowRemoved(id) => {
                let index = self.window_removed.iter().position(|(l, _)| *l == id)?;
                Some(Box::new(self.window_removed.remove(index).1))
            }
            ListenerKey::OutputChanged(id) => {
                let window = window?;
                let listeners = self.output_changed.get_mut(window)?;
                let index = listeners.iter().position(|(l, _)| *l == id)?;
                let (_, listener) = listeners.remove(index);
                if listeners.is_empty() {
                    self.output_changed.remove(window);
                }
                Some(Box::new(listener))
            }
        }
    }
}

/// Disposable handle of a registered listener
#[must_use = "dropping a Subscription removes the listener"]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    key: ListenerKey,
    window: Option<WindowId>,
}

impl Subscription {
    #[allow(dead_code)]
    /// Снимает слушатель (то же самое делает Drop)
    pub fn dispose(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let detached = registry.lock().take(self.key, self.window.as_ref());
            drop(detached);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("window", &self.window)
            .finish()
    }
}

pub struct Workspace {
    host: Arc<dyn WindowHost>,
    registry: Arc<Mutex<Registry>>,
    /// Окна, уже перечисленные через `stacking_order`; наблюдатель их не объявляет
    enumerated: Mutex<HashSet<WindowId>>,
}

impl Workspace {
    pub fn new(host: Arc<dyn WindowHost>) -> Self {
        Self {
            host,
            registry: Arc::new(Mutex::new(Registry::default())),
            enumerated: Mutex::new(HashSet::new()),
        }
    }

    pub fn host(&self) -> &dyn WindowHost {
        self.host.as_ref()
    }

    /// Открытые окна в порядке наложения. Перечисленные окна запоминаются,
    /// чтобы `run` не объявлял их повторно и не пропустил созданные позже.
    pub fn stacking_order(&self) -> Result<Vec<WindowInfo>> {
        let windows = self.host.stacking_order()?;
        self.enumerated
            .lock()
            .extend(windows.iter().map(|w| w.internal_id.clone()));
        Ok(windows)
    }

    pub fn connect_window_added(&self, listener: WindowListener) -> Subscription {
        let mut registry = self.registry.lock();
        let id = registry.allocate();
        registry.window_added.push((id, listener));
        self.subscription(ListenerKey::WindowAdded(id), None)
    }

    pub fn connect_window_removed(&self, listener: RemovedListener) -> Subscription {
        let mut registry = self.registry.lock();
        let id = registry.allocate();
        registry.window_removed.push((id, listener));
        self.subscription(ListenerKey::WindowRemoved(id), None)
    }

    /// Слушатель смены монитора одного окна; живёт до закрытия окна
    pub fn connect_output_changed(&self, window: &WindowId, listener: WindowListener) -> Subscription {
        let mut registry = self.registry.lock();
        let id = registry.allocate();
        registry
            .output_changed
            .entry(window.clone())
            .or_default()
            .push((id, listener));
        self.subscription(ListenerKey::OutputChanged(id), Some(window.clone()))
    }

    fn subscription(&self, key: ListenerKey, window: Option<WindowId>) -> Subscription {
        Subscription {
            registry: Arc::downgrade(&self.registry),
            key,
            window,
        }
    }

    #[allow(dead_code)]
    /// Количество слушателей смены монитора для окна
    pub fn output_listener_count(&self, window: &WindowId) -> usize {
        self.registry
            .lock()
            .output_changed
            .get(window)
            .map_or(0, |listeners| listeners.len())
    }

    /// Доставляет одно событие. Слушатели вызываются вне блокировки реестра,
    /// поэтому могут регистрировать новых слушателей.
    pub fn dispatch(&self, event: &WindowEvent) {
        debug!(window = %event.window_id(), "Событие окна: {}", event);

        match event {
            WindowEvent::Added(window) => {
                let listeners: SmallVec<[WindowListener; 4]> = self
                    .registry
                    .lock()
                    .window_added
                    .iter()
                    .map(|(_, l)| l.clone())
                    .collect();
                for listener in listeners {
                    listener(self, window);
                }
            }
            WindowEvent::OutputChanged(id) => {
                let listeners: SmallVec<[WindowListener; 2]> = match self.registry.lock().output_changed.get(id) {
                    Some(listeners) => listeners.iter().map(|(_, l)| l.clone()).collect(),
                    None => return,
                };

                let window = match self.host.window(id) {
                    Ok(Some(window)) => window,
                    Ok(None) => {
                        debug!("Окно {} закрылось до обработки события", id);
                        return;
                    }
                    Err(e) => {
                        warn!("Не удалось прочитать окно {}: {}", id, e);
                        return;
                    }
                };

                for listener in listeners {
                    listener(self, &window);
                }
            }
            WindowEvent::Removed(id) => {
                let listeners: SmallVec<[RemovedListener; 4]> = self
                    .registry
                    .lock()
                    .window_removed
                    .iter()
                    .map(|(_, l)| l.clone())
                    .collect();
                for listener in listeners {
                    listener(self, id);
                }
                // Хост сам аннулирует подписки закрытого окна
                let purged = self.registry.lock().output_changed.remove(id);
                drop(purged);
            }
        }
    }

    /// Запускает наблюдение хоста и обрабатывает события до его завершения
    pub async fn run(&self) -> Result<()> {
        // Тот же снимок, что видели слушатели при установке: окна, созданные
        // после него, наблюдатель объявит как новые
        let known = self.enumerated.lock().clone();

        let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let host = self.host.clone();
        let watcher = tokio::spawn(async move { host.watch(known, tx).await });

        info!("Workspace обрабатывает события окон");
        while let Some(event) = rx.recv().await {
            self.dispatch(&event);
        }

        match watcher.await {
            Ok(result) => result,
            Err(e) => Err(screen_fit_error!(internal, "Наблюдение за окнами прервано: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::Rect;
    use crate::services::window_host::DryRunHost;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn workspace() -> (Arc<DryRunHost>, Workspace) {
        let host = Arc::new(DryRunHost::new(Arc::new(Config::default())));
        let workspace = Workspace::new(host.clone());
        (host, workspace)
    }

    fn counter() -> (Arc<AtomicUsize>, WindowListener) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        let listener: WindowListener = Arc::new(move |_: &Workspace, _: &WindowInfo| {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        (count, listener)
    }

    #[tokio::test]
    async fn test_run_announces_windows_created_after_enumeration() {
        let mut config = Config::default();
        config.host.dry_run_hop_interval_ms = 60_000;
        let host = Arc::new(DryRunHost::new(Arc::new(config)));
        let workspace = Arc::new(Workspace::new(host.clone()));

        let seen: Arc<Mutex<Vec<WindowId>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_inner = seen.clone();
        let _added = workspace.connect_window_added(Arc::new(move |_: &Workspace, window: &WindowInfo| {
            seen_inner.lock().push(window.internal_id.clone());
        }));

        let enumerated = workspace.stacking_order().unwrap();
        let late = host.add_window("librewolf", Rect::new(0, 0, 100, 100));

        let runner = workspace.clone();
        let handle = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        handle.abort();

        let seen = seen.lock().clone();
        assert_eq!(seen, vec![late]);
        assert!(enumerated.iter().all(|w| !seen.contains(&w.internal_id)));
    }

    #[test]
    fn test_output_changed_reaches_only_that_window() {
        let (host, workspace) = workspace();
        let windows = host.stacking_order().unwrap();
        let (count, listener) = counter();
        let _sub = workspace.connect_output_changed(&windows[0].internal_id, listener);

        workspace.dispatch(&WindowEvent::OutputChanged(windows[1].internal_id.clone()));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        workspace.dispatch(&WindowEvent::OutputChanged(windows[0].internal_id.clone()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_and_dispose_unsubscribe() {
        let (host, workspace) = workspace();
        let id = host.stacking_order().unwrap()[0].internal_id.clone();
        let (count, listener) = counter();

        let sub = workspace.connect_output_changed(&id, listener.clone());
        assert_eq!(workspace.output_listener_count(&id), 1);
        sub.dispose();
        assert_eq!(workspace.output_listener_count(&id), 0);

        let sub = workspace.connect_window_added(listener);
        drop(sub);
        let window = host.stacking_order().unwrap()[1].clone();
        workspace.dispatch(&WindowEvent::Added(window));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_removed_purges_output_listeners() {
        let (host, workspace) = workspace();
        let id = host.stacking_order().unwrap()[0].internal_id.clone();
        let (count, listener) = counter();
        let _sub = workspace.connect_output_changed(&id, listener);

        let removed = Arc::new(AtomicUsize::new(0));
        let removed_inner = removed.clone();
        let _removed_sub = workspace.connect_window_removed(Arc::new(move |_: &Workspace, _: &WindowId| {
            removed_inner.fetch_add(1, Ordering::SeqCst);
        }));

        workspace.dispatch(&WindowEvent::Removed(id.clone()));
        assert_eq!(removed.load(Ordering::SeqCst), 1);
        assert_eq!(workspace.output_listener_count(&id), 0);

        workspace.dispatch(&WindowEvent::OutputChanged(id));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_closed_window_is_skipped_silently() {
        let (host, workspace) = workspace();
        let id = host.add_window("librewolf", Rect::new(0, 0, 100, 100));
        let (count, listener) = counter();
        let _sub = workspace.connect_output_changed(&id, listener);

        host.remove_window(&id);
        workspace.dispatch(&WindowEvent::OutputChanged(id));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_may_register_listeners() {
        let (host, workspace) = workspace();
        let subs: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));
        let (count, output_listener) = counter();

        let subs_inner = subs.clone();
        let _added = workspace.connect_window_added(Arc::new(move |ws: &Workspace, window: &WindowInfo| {
            let sub = ws.connect_output_changed(&window.internal_id, output_listener.clone());
            subs_inner.lock().push(sub);
        }));

        let id = host.add_window("librewolf", Rect::new(0, 0, 100, 100));
        let window = host.window(&id).unwrap().unwrap();
        workspace.dispatch(&WindowEvent::Added(window));
        assert_eq!(workspace.output_listener_count(&id), 1);

        host.move_to_screen(&id, "HDMI-1");
        workspace.dispatch(&WindowEvent::OutputChanged(id));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
