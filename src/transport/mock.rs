// Scripted in-process transport for exercising stage logic off-hardware
//
// Every sent command is recorded in order; each receive pops the next
// scripted reply, and an exhausted script reads as a timeout.

use std::collections::VecDeque;
use std::time::Duration;

use super::Transport;
use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::protocol::{Command, Packet, PacketKind};

#[derive(Debug)]
enum Reply {
    Packet(Packet),
    Timeout,
}

/// Transport double with one discoverable device (`mock0`) by default.
#[derive(Debug)]
pub struct MockTransport {
    locators: Vec<String>,
    open_locator: Option<String>,
    sent: Vec<(Option<Channel>, Command)>,
    replies: VecDeque<Reply>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            locators: vec!["mock0".to_string()],
            open_locator: None,
            sent: Vec::new(),
            replies: VecDeque::new(),
        }
    }

    /// Double whose device enumeration comes up empty.
    pub fn unplugged() -> Self {
        Self {
            locators: Vec::new(),
            ..Self::new()
        }
    }

    /// Queue a reply packet.
    pub fn push_packet(&mut self, kind: PacketKind, channel: u8, data1: u32, data2: i32) {
        self.replies.push_back(Reply::Packet(Packet {
            kind,
            channel,
            data1,
            data2,
        }));
    }

    /// Queue a receive timeout.
    pub fn push_timeout(&mut self) {
        self.replies.push_back(Reply::Timeout);
    }

    /// Commands sent so far, in order.
    pub fn sent(&self) -> &[(Option<Channel>, Command)] {
        &self.sent
    }

    /// Forget the commands recorded so far.
    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }

    /// Locator of the currently open device, if any.
    pub fn open_locator(&self) -> Option<&str> {
        self.open_locator.as_deref()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn find_devices(&mut self) -> Result<Vec<String>> {
        Ok(self.locators.clone())
    }

    fn open(&mut self, locator: &str) -> Result<()> {
        self.open_locator = Some(locator.to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open_locator = None;
        Ok(())
    }

    fn send(&mut self, channel: Option<Channel>, command: &Command) -> Result<()> {
        self.sent.push((channel, command.clone()));
        Ok(())
    }

    fn receive_next_packet(&mut self, _timeout: Duration) -> Result<Packet> {
        match self.replies.pop_front() {
            Some(Reply::Packet(packet)) => Ok(packet),
            Some(Reply::Timeout) | None => Err(Error::Timeout),
        }
    }
}
