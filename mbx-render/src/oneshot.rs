//! Single-value channel from a pool thread back to a (sync or async) caller.
//!
//! Small enough that pulling in an async runtime for it is not worthwhile.

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::{Arc, Condvar, Mutex, MutexGuard},
    task::{Context, Poll, Waker},
};

/// Creates a connected sender/receiver pair.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let slot = Arc::new(Slot {
        state: Mutex::new(State::Empty),
        filled: Condvar::new(),
    });
    (Sender { slot: slot.clone() }, Receiver { slot })
}

/// Why no value was received.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecvError {
    /// The sender was dropped without sending.
    Disconnected,
    /// A thread panicked while holding the channel lock.
    Poisoned,
}

impl Display for RecvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecvError::Disconnected => write!(f, "sender dropped without a value"),
            RecvError::Poisoned => write!(f, "channel lock poisoned"),
        }
    }
}

impl std::error::Error for RecvError {}

enum State<T> {
    Empty,
    /// An async receiver is parked.
    Parked(Waker),
    Full(T),
    /// Value already taken, or one side is gone.
    Closed,
}

struct Slot<T> {
    state: Mutex<State<T>>,
    filled: Condvar,
}

impl<T> Slot<T> {
    fn lock(&self) -> Option<MutexGuard<'_, State<T>>> {
        self.state.lock().ok()
    }
}

pub struct Sender<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Sender<T> {
    /// True once the receiver is gone; work for it can be skipped.
    pub fn is_closed(&self) -> bool {
        match self.slot.lock() {
            Some(state) => matches!(*state, State::Closed),
            None => true,
        }
    }

    /// Delivers the value. A value sent to a dropped receiver is discarded.
    pub fn send(self, value: T) {
        let Some(mut state) = self.slot.lock() else {
            return;
        };
        match std::mem::replace(&mut *state, State::Closed) {
            State::Empty => *state = State::Full(value),
            State::Parked(waker) => {
                *state = State::Full(value);
                waker.wake();
            }
            State::Full(_) | State::Closed => (),
        }
        self.slot.filled.notify_one();
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let Some(mut state) = self.slot.lock() else {
            return;
        };
        match std::mem::replace(&mut *state, State::Closed) {
            full @ State::Full(_) => *state = full,
            State::Parked(waker) => waker.wake(),
            State::Empty | State::Closed => (),
        }
        self.slot.filled.notify_one();
    }
}

pub struct Receiver<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Receiver<T> {
    /// Blocks until the value arrives or the sender is dropped.
    pub fn recv(self) -> Result<T, RecvError> {
        let mut state = self.slot.lock().ok_or(RecvError::Poisoned)?;
        loop {
            match std::mem::replace(&mut *state, State::Closed) {
                State::Full(value) => return Ok(value),
                State::Closed => return Err(RecvError::Disconnected),
                pending => *state = pending,
            }
            state = self
                .slot
                .filled
                .wait(state)
                .map_err(|_| RecvError::Poisoned)?;
        }
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        if let Some(mut state) = self.slot.lock() {
            *state = State::Closed;
        }
    }
}

impl<T> Future for Receiver<T> {
    type Output = Result<T, RecvError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(mut state) = self.slot.lock() else {
            return Poll::Ready(Err(RecvError::Poisoned));
        };
        match std::mem::replace(&mut *state, State::Closed) {
            State::Full(value) => Poll::Ready(Ok(value)),
            State::Closed => Poll::Ready(Err(RecvError::Disconnected)),
            State::Empty | State::Parked(_) => {
                *state = State::Parked(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
