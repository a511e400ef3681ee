//! Scripted transfer handle for unit tests

use std::collections::VecDeque;
use std::io::{Read, Write};

use crate::engine::{HandleOptions, TransferHandle, TransferOption};
use crate::error::TransferError;

/// What a single `perform` call does
pub(crate) enum Step {
    /// Write these bytes to the configured sink
    Write(Vec<u8>),
    /// Drain the configured read source
    ReadAll,
    /// Fail the attempt
    Fail(TransferError),
    /// Write these bytes to the sink, then fail
    WriteThenFail(Vec<u8>, TransferError),
    /// Consume this many bytes of the read source, then fail
    ReadThenFail(usize, TransferError),
}

/// Transfer handle that replays a fixed script and records what it saw
#[derive(Default)]
pub(crate) struct MockHandle {
    options: HandleOptions,
    script: VecDeque<Step>,
    /// Step used once the script runs out; `None` means succeed silently
    pub fallback: Option<fn() -> Step>,
    pub perform_calls: u32,
    pub reset_calls: u32,
    pub urls: Vec<String>,
    pub uploaded: Vec<u8>,
    pub declared_sizes: Vec<Option<u64>>,
    /// Bytes returned by a read issued after the source was drained
    pub trailing_read: Option<usize>,
    /// Called at the start of every `perform`
    pub observer: Option<Box<dyn FnMut()>>,
}

impl MockHandle {
    pub(crate) fn new(script: Vec<Step>) -> Self {
        MockHandle {
            script: script.into(),
            ..MockHandle::default()
        }
    }

    pub(crate) fn always(step: fn() -> Step) -> Self {
        MockHandle {
            fallback: Some(step),
            ..MockHandle::default()
        }
    }
}

impl TransferHandle for MockHandle {
    fn reset(&mut self) {
        self.reset_calls += 1;
        self.options = HandleOptions::default();
    }

    fn set_option(&mut self, option: TransferOption) {
        self.options.apply(option);
    }

    fn perform(&mut self) -> Result<(), TransferError> {
        self.perform_calls += 1;
        if let Some(observe) = self.observer.as_mut() {
            observe();
        }
        if let Some(url) = &self.options.url {
            self.urls.push(url.clone());
        }
        self.declared_sizes.push(self.options.in_file_size);

        let step = match self.script.pop_front() {
            Some(step) => step,
            None => match self.fallback {
                Some(make) => make(),
                None => return Ok(()),
            },
        };

        match step {
            Step::Write(bytes) => {
                if let Some(sink) = self.options.write_sink.as_mut() {
                    sink.write_all(&bytes).expect("mock sink write");
                }
                Ok(())
            }
            Step::ReadAll => {
                if let Some(source) = self.options.read_source.as_mut() {
                    source.read_to_end(&mut self.uploaded).expect("mock source read");
                    let mut probe = [0u8; 16];
                    self.trailing_read = Some(source.read(&mut probe).expect("mock source read"));
                }
                Ok(())
            }
            Step::Fail(err) => Err(err),
            Step::WriteThenFail(bytes, err) => {
                if let Some(sink) = self.options.write_sink.as_mut() {
                    sink.write_all(&bytes).expect("mock sink write");
                }
                Err(err)
            }
            Step::ReadThenFail(count, err) => {
                if let Some(source) = self.options.read_source.as_mut() {
                    let mut partial = vec![0u8; count];
                    source.read_exact(&mut partial).expect("mock source read");
                }
                Err(err)
            }
        }
    }

    fn options(&self) -> &HandleOptions {
        &self.options
    }

    fn options_mut(&mut self) -> &mut HandleOptions {
        &mut self.options
    }
}
