//! Status and progress narration for a generation run.

/// Receives human-readable status lines and a completion percentage.
pub trait Reporter {
    fn status(&mut self, message: &str);

    fn progress(&mut self, percent: u8);
}

/// A [`Reporter`] made of two closures.
pub struct Callbacks<S, P> {
    on_status: S,
    on_progress: P,
}

impl<S, P> Callbacks<S, P>
where
    S: FnMut(&str),
    P: FnMut(u8),
{
    pub fn new(on_status: S, on_progress: P) -> Self {
        Callbacks { on_status, on_progress }
    }
}

impl<S, P> Reporter for Callbacks<S, P>
where
    S: FnMut(&str),
    P: FnMut(u8),
{
    fn status(&mut self, message: &str) {
        (self.on_status)(message)
    }

    fn progress(&mut self, percent: u8) {
        (self.on_progress)(percent)
    }
}

/// Discards everything; the channel still logs each status line.
pub struct Silent;

impl Reporter for Silent {
    fn status(&mut self, _message: &str) {}

    fn progress(&mut self, _percent: u8) {}
}

/// Wraps a caller's reporter for one run.
/// Status lines are also logged and progress never moves backwards or past 100.
pub(crate) struct Channel<'a> {
    reporter: &'a mut dyn Reporter,
    percent: u8,
}

impl<'a> Channel<'a> {
    pub(crate) fn new(reporter: &'a mut dyn Reporter) -> Self {
        Channel { reporter, percent: 0 }
    }

    pub(crate) fn status(&mut self, message: &str) {
        log::info!("{}", message);
        self.reporter.status(message);
    }

    pub(crate) fn warn(&mut self, message: &str) {
        log::warn!("{}", message);
        self.reporter.status(message);
    }

    pub(crate) fn progress(&mut self, percent: u8) {
        self.percent = self.percent.max(percent.min(100));
        self.reporter.progress(self.percent);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records everything it is told.
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub(crate) messages: Vec<String>,
        pub(crate) percents: Vec<u8>,
    }

    impl Reporter for Recorder {
        fn status(&mut self, message: &str) {
            self.messages.push(message.to_owned());
        }

        fn progress(&mut self, percent: u8) {
            self.percents.push(percent);
        }
    }

    #[test]
    fn callbacks_forward_both_streams() {
        let mut messages = Vec::new();
        let mut percents = Vec::new();
        {
            let mut callbacks = Callbacks::new(
                |message: &str| messages.push(message.to_owned()),
                |percent| percents.push(percent),
            );
            let mut channel = Channel::new(&mut callbacks);
            channel.status("Reading parts.csv");
            channel.warn("Could not find LOCATION column");
            channel.progress(40);
        }
        assert_eq!(messages, vec!["Reading parts.csv", "Could not find LOCATION column"]);
        assert_eq!(percents, vec![40]);
    }

    #[test]
    fn progress_is_monotonic_and_capped() {
        let mut recorder = Recorder::default();
        let mut channel = Channel::new(&mut recorder);
        for percent in [0, 50, 30, 120, 100] {
            channel.progress(percent);
        }
        assert_eq!(recorder.percents, vec![0, 50, 50, 100, 100]);
    }
}
