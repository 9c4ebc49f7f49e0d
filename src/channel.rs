//! Wrapper to in-memory channels.
//!
//! This module exists to ease the transition between channel libraries.

use flume::{
    bounded as bounded_ext, Receiver as ReceiverExt, RecvError as ExtRecvError,
    SendError as SendErrorExt, Sender as SenderExt,
};

pub trait ChannelItem: Send + 'static {}
impl<T: Send + 'static> ChannelItem for T {}

pub type SendError<T> = SendErrorExt<T>;
pub type RecvError = ExtRecvError;

/// Crate a new pair sender/receiver with limited capacity.
pub(crate) fn bounded<T: ChannelItem>(size: usize) -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = bounded_ext(size);
    (Sender(tx), Receiver(rx))
}

/// A wrapper on a bounded channel sender.
#[derive(Debug, Clone)]
pub(crate) struct Sender<T: ChannelItem>(SenderExt<T>);
/// A wrapper on a bounded channel receiver.
#[derive(Debug)]
pub(crate) struct Receiver<T: ChannelItem>(ReceiverExt<T>);

impl<T: ChannelItem> Sender<T> {
    /// Send a message in the channel, blocking if it's full.
    ///
    /// Fails only when the receiver has been dropped.
    #[inline]
    pub fn send(&self, item: T) -> Result<(), SendError<T>> {
        self.0.send(item)
    }
}

impl<T: ChannelItem> Receiver<T> {
    /// Block until a message is present in the channel and return it when ready.
    ///
    /// An error is returned once every sender has been dropped and the channel is empty.
    #[inline]
    pub fn recv(&self) -> Result<T, RecvError> {
        self.0.recv()
    }

    /// Iterate over the messages until every sender has been dropped.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.recv().ok())
    }
}
