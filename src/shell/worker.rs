//! Runs a job on a background thread and streams its narration back over a channel.

use crate::pipeline::generate;
use crate::pipeline::GenerateError;
use crate::pipeline::Job;
use crate::report::Reporter;
use anyhow::Context;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;
use std::thread;

#[derive(Debug)]
pub enum Message {
    Status(String),
    Progress(u8),
    Finished(Result<PathBuf, GenerateError>),
}

/// Forwards everything to the channel and pokes the UI so it repaints.
struct ChannelReporter<N> {
    sender: Sender<Message>,
    notify: N,
}

impl<N: Fn()> ChannelReporter<N> {
    fn send(&self, message: Message) {
        // The receiving side may already be gone when its window closed.
        let _ = self.sender.send(message);
        (self.notify)();
    }
}

impl<N: Fn()> Reporter for ChannelReporter<N> {
    fn status(&mut self, message: &str) {
        self.send(Message::Status(message.to_owned()));
    }

    fn progress(&mut self, percent: u8) {
        self.send(Message::Progress(percent));
    }
}

/// Starts `job` on its own thread. `notify` runs after every message.
pub fn spawn<N>(job: Job, notify: N) -> anyhow::Result<Receiver<Message>>
where
    N: Fn() + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name(format!("labels-{}", job.variant))
        .spawn(move || {
            let mut reporter = ChannelReporter { sender, notify };
            let result = generate(&job, &mut reporter);
            reporter.send(Message::Finished(result));
        })
        .context("Cannot start the label worker thread")?;
    Ok(receiver)
}
