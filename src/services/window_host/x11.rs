use super::r#trait::WindowHost;
use crate::config::Config;
use crate::error::{Result, ScreenFitError};
use crate::events::{Rect, Screen, WindowEvent, WindowId, WindowInfo};
use crate::screen_fit_error;
use std::collections::{HashMap, HashSet};
use std::process::Command;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

/// Хост поверх X11 и EWMH: `wmctrl` для списка окон и записи геометрии,
/// `xprop` для класса и состояния окна, `xrandr` для мониторов.
pub struct X11Host {
    config: Arc<Config>,
}

/// Строка `wmctrl -lGx`
#[derive(Debug, Clone, PartialEq, Eq)]
struct ClientEntry {
    id: WindowId,
    frame: Rect,
}

/// Разобранный вывод `xprop -id <id> WM_CLASS _NET_WM_STATE`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ClientProperties {
    resource_name: String,
    full_screen: bool,
    maximize_mode: u32,
}

impl X11Host {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        info!("Инициализация X11Host");

        for (program, args) in [("wmctrl", &["-m"][..]), ("xrandr", &["--listmonitors"][..])] {
            run(program, args).map_err(|e| {
                screen_fit_error!(service_unavailable, "{} недоступен: {}", program, e)
            })?;
        }

        Ok(Self { config })
    }

    fn screens(&self) -> Result<Vec<Screen>> {
        let stdout = run("xrandr", &["--listmonitors"])?;
        let screens = parse_monitors(&stdout)?;
        if screens.is_empty() {
            return Err(ScreenFitError::parse("xrandr --listmonitors", "мониторы не найдены"));
        }
        Ok(screens)
    }

    fn clients(&self) -> Result<Vec<ClientEntry>> {
        let stdout = run("wmctrl", &["-lGx"])?;
        Ok(stdout.lines().filter_map(parse_client_line).collect())
    }

    /// Идентификаторы окон снизу вверх
    fn stacking_ids(&self) -> Result<Vec<WindowId>> {
        let stdout = run("xprop", &["-root", "_NET_CLIENT_LIST_STACKING"])?;
        Ok(parse_stacking(&stdout))
    }

    fn snapshot(&self, entry: &ClientEntry, screens: &[Screen]) -> Result<WindowInfo> {
        let stdout = run("xprop", &["-id", entry.id.as_str(), "WM_CLASS", "_NET_WM_STATE"])?;
        let props = parse_properties(&stdout);
        let output = Screen::containing(screens, &entry.frame)
            .cloned()
            .ok_or_else(|| screen_fit_error!(internal, "нет мониторов для окна {}", entry.id))?;

        Ok(WindowInfo::new(entry.id.clone(), props.resource_name, output, entry.frame)
            .with_full_screen(props.full_screen)
            .with_maximize_mode(props.maximize_mode))
    }

    /// Монитор каждого окна в порядке вывода `wmctrl`
    fn outputs(&self, clients: &[ClientEntry], screens: &[Screen]) -> Vec<(WindowId, String)> {
        clients
            .iter()
            .filter_map(|entry| {
                Screen::containing(screens, &entry.frame).map(|s| (entry.id.clone(), s.name.clone()))
            })
            .collect()
    }

    /// Один опрос: события относительно предыдущего снимка мониторов окон
    fn poll(
        &self,
        previous: Option<&HashMap<WindowId, String>>,
        known: &HashSet<WindowId>,
    ) -> Result<(HashMap<WindowId, String>, Vec<WindowEvent>)> {
        let screens = self.screens()?;
        let clients = self.clients()?;
        let current = self.outputs(&clients, &screens);
        let entries: HashMap<&WindowId, &ClientEntry> =
            clients.iter().map(|entry| (&entry.id, entry)).collect();

        Ok(diff_outputs(previous, current, known, |id| {
            let entry = entries
                .get(id)
                .ok_or_else(|| screen_fit_error!(internal, "окно {} пропало из списка", id))?;
            self.snapshot(entry, &screens)
        }))
    }
}

/// Сравнивает мониторы окон с предыдущим опросом.
///
/// На первом опросе (`previous == None`) новыми считаются только окна вне
/// `known`. Окно, снимок которого не удалось прочитать, не попадает в
/// результат и будет объявлено на следующем опросе.
fn diff_outputs<F>(
    previous: Option<&HashMap<WindowId, String>>,
    current: Vec<(WindowId, String)>,
    known: &HashSet<WindowId>,
    mut snapshot: F,
) -> (HashMap<WindowId, String>, Vec<WindowEvent>)
where
    F: FnMut(&WindowId) -> Result<WindowInfo>,
{
    let mut outputs = HashMap::with_capacity(current.len());
    let mut events = Vec::new();

    for (id, output) in current {
        let is_new = match previous {
            None => !known.contains(&id),
            Some(prev) => match prev.get(&id) {
                None => true,
                Some(old) => {
                    if *old != output {
                        debug!("Окно {} перешло с {} на {}", id, old, output);
                        events.push(WindowEvent::OutputChanged(id.clone()));
                    }
                    false
                }
            },
        };

        if is_new {
            match snapshot(&id) {
                Ok(window) => events.push(WindowEvent::Added(window)),
                Err(e) => {
                    // Окно могло закрыться между вызовами; повторим на следующем опросе
                    debug!("Не удалось прочитать новое окно {}: {}", id, e);
                    continue;
                }
            }
        }
        outputs.insert(id, output);
    }

    if let Some(prev) = previous {
        let mut removed: Vec<&WindowId> = prev.keys().filter(|id| !outputs.contains_key(*id)).collect();
        removed.sort();
        events.extend(removed.into_iter().map(|id| WindowEvent::Removed(id.clone())));
    }

    (outputs, events)
}

#[async_trait::async_trait]
impl WindowHost for X11Host {
    fn stacking_order(&self) -> Result<Vec<WindowInfo>> {
        let screens = self.screens()?;
        let mut clients = self.clients()?;

        let order: HashMap<WindowId, usize> = self
            .stacking_ids()?
            .into_iter()
            .enumerate()
            .map(|(index, id)| (id, index))
            .collect();
        clients.sort_by_key(|entry| order.get(&entry.id).copied().unwrap_or(usize::MAX));

        let mut windows = Vec::with_capacity(clients.len());
        for entry in &clients {
            match self.snapshot(entry, &screens) {
                Ok(window) => windows.push(window),
                Err(e) => debug!("Пропускаем окно {}: {}", entry.id, e),
            }
        }
        Ok(windows)
    }

    fn window(&self, id: &WindowId) -> Result<Option<WindowInfo>> {
        let Some(entry) = self.clients()?.into_iter().find(|entry| &entry.id == id) else {
            return Ok(None);
        };
        let screens = self.screens()?;
        self.snapshot(&entry, &screens).map(Some)
    }

    fn set_frame_geometry(&self, id: &WindowId, geometry: Rect) -> Result<()> {
        let move_resize = format!(
            "0,{},{},{},{}",
            geometry.x, geometry.y, geometry.width, geometry.height
        );
        run("wmctrl", &["-i", "-r", id.as_str(), "-e", &move_resize])?;
        Ok(())
    }

    async fn watch(&self, known: HashSet<WindowId>, events: mpsc::Sender<WindowEvent>) -> Result<()> {
        info!(
            "Запуск polling отслеживания окон X11 (интервал {} мс)",
            self.config.host.polling_interval_ms
        );

        let mut ticker = interval(Duration::from_millis(self.config.host.polling_interval_ms));
        let mut previous: Option<HashMap<WindowId, String>> = None;

        loop {
            ticker.tick().await;

            let (current, batch) = match self.poll(previous.as_ref(), &known) {
                Ok(result) => result,
                Err(e) => {
                    warn!("Опрос окон не удался: {}", e);
                    continue;
                }
            };

            for event in batch {
                if events.send(event).await.is_err() {
                    debug!("Канал событий закрыт, останавливаем опрос");
                    return Ok(());
                }
            }
            previous = Some(current);
        }
    }
}

fn run(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program).args(args).output()?;
    if !output.status.success() {
        return Err(ScreenFitError::Command {
            command: format!("{} {}", program, args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Нормализует идентификатор X11 (`0x3a00003` и `0x03a00003` - одно окно)
fn normalize_id(raw: &str) -> Option<WindowId> {
    let hex = raw.trim().trim_end_matches(',').strip_prefix("0x")?;
    let value = u32::from_str_radix(hex, 16).ok()?;
    Some(WindowId::new(format!("0x{:08x}", value)))
}

/// `0x03a00003  0 0    0    2560 1411 Navigator.librewolf  host Title`
fn parse_client_line(line: &str) -> Option<ClientEntry> {
    let mut fields = line.split_whitespace();
    let id = normalize_id(fields.next()?)?;
    let desktop: i64 = fields.next()?.parse().ok()?;
    // -1: панели, доки и прочие "липкие" окна вне рабочих столов
    if desktop < 0 {
        return None;
    }
    let x = fields.next()?.parse().ok()?;
    let y = fields.next()?.parse().ok()?;
    let width = fields.next()?.parse().ok()?;
    let height = fields.next()?.parse().ok()?;
    Some(ClientEntry {
        id,
        frame: Rect::new(x, y, width, height),
    })
}

fn parse_properties(stdout: &str) -> ClientProperties {
    let mut props = ClientProperties::default();

    for line in stdout.lines() {
        let Some((name, value)) = line.split_once(" = ") else {
            continue;
        };
        if name.starts_with("WM_CLASS") {
            // "instance", "Class" - приложение определяет класс
            props.resource_name = value
                .split(',')
                .map(|part| part.trim().trim_matches('"'))
                .last()
                .unwrap_or_default()
                .to_lowercase();
        } else if name.starts_with("_NET_WM_STATE") {
            for atom in value.split(',').map(str::trim) {
                match atom {
                    "_NET_WM_STATE_FULLSCREEN" => props.full_screen = true,
                    "_NET_WM_STATE_MAXIMIZED_VERT" => props.maximize_mode |= 1,
                    "_NET_WM_STATE_MAXIMIZED_HORZ" => props.maximize_mode |= 2,
                    _ => {}
                }
            }
        }
    }

    props
}

/// `_NET_CLIENT_LIST_STACKING(WINDOW): window id # 0x1a00003, 0x3a00003`
fn parse_stacking(stdout: &str) -> Vec<WindowId> {
    stdout
        .split_once('#')
        .map(|(_, ids)| ids.split(',').filter_map(normalize_id).collect())
        .unwrap_or_default()
}

/// ` 0: +*DP-1 2560/597x1440/336+0+0  DP-1`
fn parse_monitors(stdout: &str) -> Result<Vec<Screen>> {
    let mut screens = Vec::new();

    for line in stdout.lines().skip_while(|l| l.starts_with("Monitors:")) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        let geometry = parse_monitor_geometry(fields[2])
            .ok_or_else(|| ScreenFitError::parse("xrandr --listmonitors", line.trim()))?;
        screens.push(Screen::new(fields[fields.len() - 1], geometry));
    }

    Ok(screens)
}

/// `2560/597x1440/336+0+0`; смещения могут быть отрицательными (`+-1920+0`)
fn parse_monitor_geometry(token: &str) -> Option<Rect> {
    let (width_part, rest) = token.split_once('x')?;
    let width = width_part.split('/').next()?.parse().ok()?;

    let offsets_start = rest.find('+')?;
    let height = rest[..offsets_start].split('/').next()?.parse().ok()?;
    let (x, y) = rest[offsets_start + 1..].split_once('+')?;

    Some(Rect::new(x.parse().ok()?, y.parse().ok()?, width, height))
}
