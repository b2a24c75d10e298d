//! Session management
//!
//! A session is one execution of an executable. Each session gets its own
//! timestamped directory holding the log file, any JSON snapshots saved
//! through [`Session::save`] and the CSV archives.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use erased_serde::Serialize;
use log::{info, warn};
use std::fs;
use std::ffi::OsStr;
use std::fs::File;
use std::path::Path;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

// Internal imports
use crate::host::{self, HostError};
use crate::time;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Suffix of the session directory name, in `strftime` syntax.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// How long the save thread waits for new data before checking whether the
/// session has been closed.
const SAVE_POLL_PERIOD: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

type SaveRequest = (PathBuf, Box<dyn Serialize + Send>);

/// Directories and background saving for one execution.
pub struct Session {
    pub session_root: PathBuf,

    /// CSV archives are written below this directory
    pub arch_root: PathBuf,

    pub log_file_path: PathBuf,

    save_sender: Option<Sender<SaveRequest>>,

    save_jh: Option<JoinHandle<()>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot locate the sessions directory: {0}")]
    SwRoot(HostError),

    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error("A session has already been started in this process ({0})")]
    CannotInitEpoch(conquer_once::TryInitError),

    #[error("The session epoch is not set")]
    CannotGetEpoch,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Create `$TELEOP_SW_ROOT/{sessions_dir}/{exec_name}_{timestamp}` and start the save thread.
    ///
    /// Only one session may be started per process, as the epoch is global.
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        // Set the session epoch
        SESSION_EPOCH
            .try_init_once(Utc::now)
            .map_err(SessionError::CannotInitEpoch)?;

        // Format the session epoch as a timestamp
        let timestamp = match SESSION_EPOCH.get() {
            Some(e) => e.format(TIMESTAMP_FORMAT),
            None => return Err(SessionError::CannotGetEpoch),
        };

        // Create the session path
        let mut path = host::get_sw_root().map_err(SessionError::SwRoot)?;
        path.push(sessions_dir);
        path.push(format!("{}_{}", exec_name, timestamp));

        fs::create_dir_all(&path).map_err(SessionError::CannotCreateDir)?;

        // Create the archive dir
        let arch_root = path.join("arch");
        fs::create_dir_all(&arch_root).map_err(SessionError::CannotCreateDir)?;

        let log_file_path = path.join(format!("{}.log", exec_name));

        // Spawn the background save thread
        let (tx, rx) = channel();
        let thread_root = path.clone();
        let save_jh = thread::spawn(move || save_thread(thread_root, rx));

        Ok(Session {
            session_root: path,
            arch_root,
            log_file_path,
            save_sender: Some(tx),
            save_jh: Some(save_jh),
        })
    }

    /// Close the session once every queued snapshot has been written.
    pub fn exit(mut self) {
        info!("Stopping save thread");

        self.stop_save_thread();

        info!("Save thread exited");
    }

    /// Queue `data` to be written as pretty JSON to `path`, relative to the session root.
    ///
    /// Paths not ending in `.json` are rejected by the save thread with a warning.
    pub fn save<P: AsRef<Path>, T: serde::Serialize + Send + 'static>(&self, path: P, data: T) {
        let sender = match self.save_sender {
            Some(ref s) => s,
            None => {
                warn!("Cannot save {:?}, the session has exited", path.as_ref());
                return;
            }
        };

        if let Err(e) = sender.send((path.as_ref().to_path_buf(), Box::new(data))) {
            warn!("Could not queue snapshot {:?}: {}", path.as_ref(), e)
        }
    }

    /// Dropping the sender ends the save thread once the queue is drained.
    fn stop_save_thread(&mut self) {
        self.save_sender.take();

        if let Some(jh) = self.save_jh.take() {
            if jh.join().is_err() {
                warn!("Save thread panicked");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_save_thread();
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the number of seconds elapsed since the start of the session.
///
/// Returns zero if no session has been started yet, so that code logging
/// before (or without) a session, such as unit tests, still works.
pub fn get_elapsed_seconds() -> f64 {
    match SESSION_EPOCH.get() {
        Some(e) => {
            let elapsed = Utc::now() - *e;
            time::duration_to_seconds(elapsed).unwrap_or(std::f64::NAN)
        }
        None => 0.0,
    }
}

/// The instant the session was started.
///
/// # Panics
/// - If no session has been started in this process.
pub fn get_epoch() -> &'static DateTime<Utc> {
    SESSION_EPOCH
        .get()
        .unwrap_or_else(|| panic!("No session has been started, the epoch is unset"))
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Write queued snapshots until every sender has been dropped and the queue is empty.
fn save_thread(session_root: PathBuf, receiver: Receiver<SaveRequest>) {
    loop {
        match receiver.recv_timeout(SAVE_POLL_PERIOD) {
            Ok((path, data)) => {
                let full_path = session_root.join(path);

                if let Err(e) = write_snapshot(&full_path, data.as_ref()) {
                    warn!("Snapshot {:?} not saved: {}", full_path, e);
                }
            }
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn write_snapshot(full_path: &Path, data: &(dyn Serialize + Send)) -> Result<(), String> {
    if full_path.extension() != Some(OsStr::new("json")) {
        return Err("only .json snapshots are supported".into());
    }

    if let Some(parent) = full_path.parent() {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }

    let file = File::create(full_path).map_err(|e| e.to_string())?;

    serde_json::to_writer_pretty(file, data).map_err(|e| e.to_string())
}
