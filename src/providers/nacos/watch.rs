//! Live change subscription for a Nacos config item.
//!
//! A [`ConfigWatch`] owns a background thread that long-polls the Nacos
//! listener endpoint and invokes the caller's callback when the content
//! changes. The caller holds the subscription through a [`WatchHandle`] and
//! decides when it ends.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::Level;

use super::client::{NacosClient, content_md5};

/// Pause after a failed poll, or a reported change that turned out to be
/// none, before polling again.
const RETRY_DELAY: Duration = Duration::from_secs(2);
/// Granularity at which a sleeping watch notices a stop request.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// A change delivered to the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub namespace: String,
    pub group: String,
    pub data_id: String,
    pub data: String,
}

/// Callback invoked on the watch thread for every observed change.
pub type ChangeListener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Verbosity threshold for the watch thread's own diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ClientLogLevel(pub(crate) Level);

impl ClientLogLevel {
    fn enabled(self, level: Level) -> bool {
        level <= self.0
    }
}

macro_rules! client_log {
    ($threshold:expr, $level:ident, $($arg:tt)+) => {
        if $threshold.enabled(Level::$level) {
            tracing::event!(target: "confload::nacos", Level::$level, $($arg)+);
        }
    };
}

/// A running subscription. Stopped on drop.
pub struct ConfigWatch {
    stop: Arc<AtomicBool>,
    baseline: Option<Sender<String>>,
    thread: Option<JoinHandle<()>>,
}

impl ConfigWatch {
    /// Spawn the watch thread. It stays idle until [`ConfigWatch::arm`]
    /// supplies the content the initial fetch returned.
    pub(crate) fn start(
        client: NacosClient,
        listener: ChangeListener,
        log_level: ClientLogLevel,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let (baseline_tx, baseline_rx) = mpsc::channel();
        let thread_stop = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name(format!("nacos-watch-{}", client.settings().data_id))
            .spawn(move || {
                watch_loop(&client, listener.as_ref(), log_level, &thread_stop, baseline_rx)
            })?;

        Ok(Self {
            stop,
            baseline: Some(baseline_tx),
            thread: Some(thread),
        })
    }

    /// Begin polling for changes relative to `initial_content`.
    pub(crate) fn arm(&mut self, initial_content: &str) {
        if let Some(tx) = self.baseline.take() {
            let _ = tx.send(content_md5(initial_content));
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Ask the thread to exit. It finishes after the poll in flight returns.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.baseline.take();
    }

    /// Stop and wait for the thread to exit.
    pub fn stop_and_wait(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ConfigWatch {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for ConfigWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigWatch")
            .field("running", &self.is_running())
            .finish()
    }
}

fn watch_loop(
    client: &NacosClient,
    listener: &(dyn Fn(&ChangeEvent) + Send + Sync),
    log_level: ClientLogLevel,
    stop: &AtomicBool,
    baseline: Receiver<String>,
) {
    // Sender dropped without arming: the initial fetch failed.
    let Ok(mut current_md5) = baseline.recv() else {
        return;
    };
    let settings = client.settings();

    while !stop.load(Ordering::SeqCst) {
        match client.poll_change(&current_md5) {
            Ok(false) => {
                client_log!(log_level, DEBUG, data_id = %settings.data_id, "nacos listener poll returned no change");
            }
            Ok(true) => match client.get_config() {
                Ok(data) => {
                    let md5 = content_md5(&data);
                    if md5 == current_md5 {
                        client_log!(log_level, DEBUG, data_id = %settings.data_id, "nacos reported a change but content is unchanged");
                        sleep_unless_stopped(stop, RETRY_DELAY);
                        continue;
                    }
                    current_md5 = md5;
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    client_log!(log_level, INFO, data_id = %settings.data_id, "nacos config changed");
                    listener(&ChangeEvent {
                        namespace: settings.namespace.clone(),
                        group: settings.group.clone(),
                        data_id: settings.data_id.clone(),
                        data,
                    });
                }
                Err(e) => {
                    client_log!(log_level, ERROR, error = %e, "failed to fetch changed nacos config");
                    sleep_unless_stopped(stop, RETRY_DELAY);
                }
            },
            Err(e) => {
                client_log!(log_level, WARN, error = %e, "nacos listener poll failed");
                sleep_unless_stopped(stop, RETRY_DELAY);
            }
        }
    }
}

fn sleep_unless_stopped(stop: &AtomicBool, total: Duration) {
    let mut slept = Duration::ZERO;
    while slept < total && !stop.load(Ordering::SeqCst) {
        thread::sleep(STOP_CHECK_INTERVAL);
        slept += STOP_CHECK_INTERVAL;
    }
}

/// Caller-owned slot holding the subscription a provider starts.
///
/// The provider installs a [`ConfigWatch`] here after a successful fetch.
/// Dropping the handle stops the watch.
pub struct WatchHandle {
    slot: Arc<Mutex<Option<ConfigWatch>>>,
}

impl WatchHandle {
    pub(crate) fn new() -> (Self, Arc<Mutex<Option<ConfigWatch>>>) {
        let slot = Arc::new(Mutex::new(None));
        (
            Self {
                slot: Arc::clone(&slot),
            },
            slot,
        )
    }

    /// Whether a watch has been installed and is still running.
    pub fn is_active(&self) -> bool {
        self.slot
            .lock()
            .map(|slot| slot.as_ref().is_some_and(ConfigWatch::is_running))
            .unwrap_or(false)
    }

    /// Stop the installed watch, if any, without waiting for its thread.
    ///
    /// The thread exits on its own once the poll in flight returns.
    pub fn stop(&self) {
        drop(self.take());
    }

    /// Stop the installed watch and join its thread.
    ///
    /// A listener long-poll is not interrupted, so this can block for the
    /// long-poll timeout plus the request timeout (35 s by default).
    pub fn stop_and_wait(&self) {
        if let Some(watch) = self.take() {
            watch.stop_and_wait();
        }
    }

    fn take(&self) -> Option<ConfigWatch> {
        match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Replace the watch in `slot`, stopping whatever was there before.
pub(crate) fn install(slot: &Mutex<Option<ConfigWatch>>, watch: ConfigWatch) {
    let previous = match slot.lock() {
        Ok(mut guard) => guard.replace(watch),
        Err(poisoned) => poisoned.into_inner().replace(watch),
    };
    drop(previous);
}
