//! State of one form of the desktop shell, free of any widget toolkit.

use crate::labels::compose::Variant;
use crate::pipeline::default_output;
use crate::pipeline::Job;
use crate::shell::worker;
use crate::shell::worker::Message;
use std::path::Path;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::TryRecvError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Please select both input file and output location")]
    MissingPathError,

    #[error("A PDF is already being generated")]
    BusyError,

    #[error("{0:#}")]
    WorkerError(anyhow::Error),
}

/// How a finished run ended, for the result dialog.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Succeeded(PathBuf),
    Failed(String),
}

/// Paths, progress and log of one layout variant.
#[derive(Debug)]
pub struct Session {
    pub variant: Variant,
    pub input: String,
    pub output: String,
    pub progress: u8,
    pub log: Vec<String>,
    receiver: Option<Receiver<Message>>,
}

impl Session {
    pub fn new(variant: Variant) -> Session {
        Session {
            variant,
            input: String::new(),
            output: String::new(),
            progress: 0,
            log: Vec::new(),
            receiver: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.receiver.is_some()
    }

    /// Picks the input file and proposes `<stem>_<variant>.pdf` beside it.
    pub fn set_input(&mut self, path: &Path) {
        self.input = path.display().to_string();
        self.output = default_output(path, self.variant).display().to_string();
    }

    pub fn set_output(&mut self, path: &Path) {
        self.output = path.display().to_string();
    }

    /// Empties both paths, the progress bar and the log. A running job keeps running.
    pub fn clear(&mut self) {
        self.input.clear();
        self.output.clear();
        self.progress = 0;
        self.log.clear();
    }

    /// Starts generating on a worker thread.
    pub fn start<N>(&mut self, notify: N) -> Result<(), SessionError>
    where
        N: Fn() + Send + 'static,
    {
        if self.is_running() {
            return Err(SessionError::BusyError);
        }
        let (input, output) = (self.input.trim(), self.output.trim());
        if input.is_empty() || output.is_empty() {
            return Err(SessionError::MissingPathError);
        }

        let job = Job::new(input, output, self.variant);
        self.log.clear();
        self.progress = 0;
        let receiver = worker::spawn(job, notify).map_err(SessionError::WorkerError)?;
        self.receiver = Some(receiver);
        Ok(())
    }

    /// Drains pending worker messages. Returns the outcome once the run is over.
    pub fn poll(&mut self) -> Option<Outcome> {
        let receiver = self.receiver.as_ref()?;
        let mut outcome = None;
        loop {
            match receiver.try_recv() {
                Ok(Message::Status(message)) => self.log.push(message),
                Ok(Message::Progress(percent)) => self.progress = percent,
                Ok(Message::Finished(result)) => {
                    outcome = Some(match result {
                        Ok(path) => Outcome::Succeeded(path),
                        Err(e) => Outcome::Failed(e.to_string()),
                    });
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    let message = "The generation worker stopped unexpectedly".to_owned();
                    log::error!("{}", message);
                    self.log.push(message.clone());
                    outcome = Some(Outcome::Failed(message));
                    break;
                }
            }
        }
        if outcome.is_some() {
            self.receiver = None;
        }
        outcome
    }
}
