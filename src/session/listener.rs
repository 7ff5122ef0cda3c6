use crossbeam_channel::{unbounded, Receiver, Sender};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalculationOutcome {
    Completed,
    Failed { message: String },
}

impl CalculationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CalculationOutcome::Completed)
    }
}

/// Lifecycle notification, as delivered by [`ChannelListener`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalculationEvent {
    Started,
    Done(CalculationOutcome),
}

/// Observer of analysis runs
///
/// For every run a session calls `calculation_started` once and then `calculation_done`
/// once, on the thread that called `run`, whether or not the run succeeded.
///
/// A call rejected with `SessionBusy` is not a run and sends neither event, and neither
/// does `run_with_provider` when the configuration snapshot cannot be taken.
pub trait CalculationListener: Send + Sync {
    fn calculation_started(&self);

    fn calculation_done(&self, outcome: &CalculationOutcome);
}

/// Forwards lifecycle notifications into a channel
pub struct ChannelListener {
    sender: Sender<CalculationEvent>,
}

impl ChannelListener {
    pub fn new(sender: Sender<CalculationEvent>) -> Self {
        Self { sender }
    }

    /// Listener plus the receiving end of a fresh unbounded channel
    pub fn channel() -> (Self, Receiver<CalculationEvent>) {
        let (sender, receiver) = unbounded();
        (Self::new(sender), receiver)
    }
}

impl CalculationListener for ChannelListener {
    fn calculation_started(&self) {
        // A dropped receiver just means nobody is listening any more
        let _ = self.sender.send(CalculationEvent::Started);
    }

    fn calculation_done(&self, outcome: &CalculationOutcome) {
        let _ = self.sender.send(CalculationEvent::Done(outcome.clone()));
    }
}
