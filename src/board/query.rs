//! Pending pin state queries.
//!
//! A query is answered by whichever `PIN_STATE_RESPONSE` for that pin
//! arrives first; responses carry no request id, so two overlapping
//! queries for the same pin both resolve with the first answer.

use std::future::Future;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::BoardError;
use crate::events::PinStateReport;

/// Answer to one pin state query.
///
/// Resolves once [`Board::poll`](crate::Board::poll) processes the
/// matching response, or fails with [`BoardError::QueryCancelled`] if the
/// board disconnects first. Callers that do not run an executor can use
/// [`try_take`](Self::try_take) after polling the board.
#[derive(Debug)]
pub struct PinStateFuture {
    pin: u8,
    rx: oneshot::Receiver<PinStateReport>,
}

impl PinStateFuture {
    pub(crate) fn new(pin: u8, rx: oneshot::Receiver<PinStateReport>) -> Self {
        Self { pin, rx }
    }

    /// Queried pin.
    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// The answer if it has arrived, without waiting.
    pub fn try_take(&mut self) -> Option<Result<PinStateReport, BoardError>> {
        match self.rx.try_recv() {
            Ok(report) => Some(Ok(report)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(BoardError::QueryCancelled(self.pin))),
        }
    }
}

impl Future for PinStateFuture {
    type Output = Result<PinStateReport, BoardError>;

    fn poll(mut self: std::pin::Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let pin = self.pin;
        std::pin::Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| BoardError::QueryCancelled(pin)))
    }
}

/// Result of [`Board::read_pin`](crate::Board::read_pin).
///
/// Inputs answer from the last reported value; outputs ask the device
/// for their state.
#[derive(Debug)]
pub enum PinRead {
    /// Value known locally.
    Value(f64),
    /// Waiting on a pin state query.
    Query(PinStateFuture),
}

impl PinRead {
    /// The value if it is known, without waiting.
    pub fn try_take(&mut self) -> Option<Result<f64, BoardError>> {
        match self {
            Self::Value(v) => Some(Ok(*v)),
            Self::Query(query) => query.try_take().map(|r| r.map(|report| report.state)),
        }
    }
}

impl Future for PinRead {
    type Output = Result<f64, BoardError>;

    fn poll(self: std::pin::Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut() {
            Self::Value(v) => Poll::Ready(Ok(*v)),
            Self::Query(query) => std::pin::Pin::new(query)
                .poll(cx)
                .map(|r| r.map(|report| report.state)),
        }
    }
}
