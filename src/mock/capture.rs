//! Mock pulse capture

use core::cell::RefCell;
use std::sync::Arc;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

use crate::drivers::capture::{EdgeSink, PulseCapture};
use crate::error::CaptureError;

#[derive(Default)]
struct CaptureState {
    sink: Option<EdgeSink>,
    attach_count: usize,
    fail_attach: Option<CaptureError>,
}

/// Pulse capture driven by the test instead of a GPIO interrupt.
///
/// Clones share one state, so a test keeps a handle after moving another
/// into the RC input device.
#[derive(Clone)]
pub struct MockPulseCapture {
    state: Arc<Mutex<CriticalSectionRawMutex, RefCell<CaptureState>>>,
}

impl MockPulseCapture {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RefCell::new(CaptureState::default()))),
        }
    }

    /// Makes the next `attach` fail with `error`
    pub fn fail_attach(&self, error: CaptureError) {
        self.state
            .lock(|state| state.borrow_mut().fail_attach = Some(error));
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock(|state| state.borrow().sink.is_some())
    }

    pub fn attach_count(&self) -> usize {
        self.state.lock(|state| state.borrow().attach_count)
    }

    /// Delivers one edge as the interrupt handler would. Returns false when
    /// nothing is attached.
    pub fn inject(&self, timestamp_us: i64, rising: bool) -> bool {
        // the sink runs outside the lock, like an interrupt would
        let sink = self.state.lock(|state| state.borrow().sink.clone());
        match sink {
            Some(sink) => {
                sink.on_edge(timestamp_us, rising);
                true
            }
            None => false,
        }
    }

    /// Delivers one edge stamped by the pipeline clock
    pub fn inject_level(&self, rising: bool) -> bool {
        let sink = self.state.lock(|state| state.borrow().sink.clone());
        match sink {
            Some(sink) => {
                sink.on_level_change(rising);
                true
            }
            None => false,
        }
    }
}

impl Default for MockPulseCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseCapture for MockPulseCapture {
    fn attach(&mut self, sink: EdgeSink) -> Result<(), CaptureError> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if let Some(error) = state.fail_attach.take() {
                return Err(error);
            }
            if state.sink.is_some() {
                return Err(CaptureError::AlreadyAttached);
            }
            state.sink = Some(sink);
            state.attach_count += 1;
            Ok(())
        })
    }

    fn detach(&mut self) {
        self.state.lock(|state| state.borrow_mut().sink = None);
    }
}
