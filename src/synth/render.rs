//! Buffer-by-buffer rendering driven by live parameters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use super::oscillator::{Oscillator, SampleBlock, Tone, Voice};
use crate::config::{ConfigError, SessionConfig};
use crate::control::ParameterController;

/// Cooperative cancellation, checked between buffers.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Totals for one [`Renderer::render`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub buffers: usize,
    pub samples: usize,
    pub domain_errors: usize,
    pub cancelled: bool,
}

/// Renders a [`Voice`] in fixed-size buffers, taking one parameter snapshot
/// per buffer.
pub struct Renderer {
    oscillator: Oscillator,
    voice: Voice,
    controller: ParameterController,
    frequency: f64,
    buffer_size: usize,
}

impl Renderer {
    pub fn new(
        voice: Voice,
        controller: ParameterController,
        sample_rate: u32,
        frequency: f64,
        buffer_size: usize,
    ) -> Result<Self, ConfigError> {
        if buffer_size == 0 {
            return Err(ConfigError::BufferSize);
        }
        if !(frequency > 0.0 && frequency.is_finite()) {
            return Err(ConfigError::Frequency(frequency));
        }
        Ok(Self {
            oscillator: Oscillator::new(sample_rate)?,
            voice,
            controller,
            frequency,
            buffer_size,
        })
    }

    /// Renderer using the rate, frequency and buffer size of `session`.
    pub fn from_session(
        voice: Voice,
        controller: ParameterController,
        session: &SessionConfig,
    ) -> Result<Self, ConfigError> {
        Self::new(
            voice,
            controller,
            session.sample_rate,
            session.frequency,
            session.buffer_size,
        )
    }

    pub fn oscillator(&self) -> &Oscillator {
        &self.oscillator
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// One full buffer.
    pub fn render_buffer(&mut self) -> SampleBlock {
        self.render_block(self.buffer_size)
    }

    fn render_block(&mut self, count: usize) -> SampleBlock {
        let params = self.controller.snapshot();
        let frequency = self.frequency * params.frequency_multiplier();
        self.oscillator
            .render(&self.voice, frequency, count, Tone::from(&params))
    }

    /// Render `total` samples, handing each buffer to `sink`. `cancel` is
    /// checked before every buffer; a buffer in progress always completes.
    pub fn render(
        &mut self,
        total: usize,
        cancel: &CancelFlag,
        mut sink: impl FnMut(&[f64]),
    ) -> RenderSummary {
        let mut summary = RenderSummary::default();
        while summary.samples < total {
            if cancel.is_cancelled() {
                info!(
                    rendered = summary.samples,
                    requested = total,
                    "render cancelled"
                );
                summary.cancelled = true;
                break;
            }
            let count = self.buffer_size.min(total - summary.samples);
            let block = self.render_block(count);
            sink(&block.samples);
            summary.buffers += 1;
            summary.samples += block.samples.len();
            summary.domain_errors += block.domain_errors;
        }
        if summary.domain_errors > 0 {
            warn!(
                domain_errors = summary.domain_errors,
                samples = summary.samples,
                "render finished with domain-error fallbacks"
            );
        }
        summary
    }

    /// [`render`](Self::render) collected into one vector.
    pub fn render_to_vec(&mut self, total: usize, cancel: &CancelFlag) -> (Vec<f64>, RenderSummary) {
        let mut out = Vec::with_capacity(total);
        let summary = self.render(total, cancel, |buf| out.extend_from_slice(buf));
        (out, summary)
    }
}
