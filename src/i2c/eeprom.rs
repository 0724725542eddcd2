//! 24XX64 serial EEPROM holding a NUL terminated text record.

use std::time::Duration;

use log::debug;

use super::Bus;
use crate::{Error, Result};

pub const CAPACITY: usize = 8192;
const PAGE: usize = 32;
const WRITE_CYCLE: Duration = Duration::from_millis(5);

pub struct Eep24xx64<'a, B> {
    bus: &'a mut B,
    addr: u8,
}

impl<'a, B: Bus> Eep24xx64<'a, B> {
    pub fn new(bus: &'a mut B, addr: u8) -> Self {
        Self { bus, addr }
    }

    /// Writes `data` starting at `offset`, split on page boundaries.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        if offset + data.len() > CAPACITY {
            return Err(Error::OutOfRange(format!(
                "{} bytes at offset {offset} do not fit in {CAPACITY} byte eeprom",
                data.len()
            )));
        }
        let mut pos = offset;
        for chunk in split_pages(offset, data) {
            let mut frame = Vec::with_capacity(chunk.len() + 2);
            frame.extend_from_slice(&(pos as u16).to_be_bytes());
            frame.extend_from_slice(chunk);
            self.bus.send(self.addr, &frame)?;
            std::thread::sleep(WRITE_CYCLE);
            debug!("eeprom {:#04x}: wrote {} bytes at {pos}", self.addr, chunk.len());
            pos += chunk.len();
        }
        Ok(())
    }

    pub fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<()> {
        if offset + buf.len() > CAPACITY {
            return Err(Error::OutOfRange(format!(
                "read of {} bytes at offset {offset} past end of eeprom",
                buf.len()
            )));
        }
        self.bus
            .send_recv(self.addr, &(offset as u16).to_be_bytes(), buf)
    }

    /// Stores `text` followed by a NUL at the start of the memory.
    pub fn write_string(&mut self, text: &str) -> Result<()> {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        self.write(0, &data)
    }

    /// Reads the text record; stops at NUL or at erased (0xff) memory.
    pub fn read_string(&mut self) -> Result<String> {
        let mut text = Vec::new();
        let mut chunk = [0u8; PAGE];
        for offset in (0..CAPACITY).step_by(PAGE) {
            self.read(offset, &mut chunk)?;
            if let Some(end) = chunk.iter().position(|&c| c == 0 || c == 0xff) {
                text.extend_from_slice(&chunk[..end]);
                break;
            }
            text.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&text).into_owned())
    }
}

fn split_pages(offset: usize, data: &[u8]) -> Vec<&[u8]> {
    let mut chunks = Vec::new();
    let mut rest = data;
    let mut pos = offset;
    while !rest.is_empty() {
        let room = PAGE - pos % PAGE;
        let (head, tail) = rest.split_at(room.min(rest.len()));
        chunks.push(head);
        pos += head.len();
        rest = tail;
    }
    chunks
}
