//! Scripted I2C bus for driver tests.

use std::collections::VecDeque;

use embedded_hal::blocking::i2c;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tx {
    Write(u8, Vec<u8>),
    Read(u8, Vec<u8>),
    WriteRead(u8, Vec<u8>, Vec<u8>),
    /// A read the device does not acknowledge.
    ReadNack(u8),
}

#[derive(Debug)]
pub struct Nack;

pub struct MockBus {
    expected: VecDeque<Tx>,
}

impl MockBus {
    pub fn new(expected: Vec<Tx>) -> Self {
        Self {
            expected: expected.into(),
        }
    }

    fn next(&mut self) -> Tx {
        self.expected
            .pop_front()
            .expect("unexpected i2c transaction")
    }

    /// Asserts every scripted transaction happened.
    pub fn done(&self) {
        assert!(
            self.expected.is_empty(),
            "pending transactions: {:?}",
            self.expected
        );
    }
}

impl i2c::Write for MockBus {
    type Error = Nack;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Nack> {
        assert_eq!(self.next(), Tx::Write(address, bytes.to_vec()));
        Ok(())
    }
}

impl i2c::Read for MockBus {
    type Error = Nack;

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Nack> {
        match self.next() {
            Tx::Read(a, data) => {
                assert_eq!(a, address);
                buffer.copy_from_slice(&data);
                Ok(())
            }
            Tx::ReadNack(a) => {
                assert_eq!(a, address);
                Err(Nack)
            }
            other => panic!("expected {other:?}, got read from {address:#04x}"),
        }
    }
}

impl i2c::WriteRead for MockBus {
    type Error = Nack;

    fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Nack> {
        match self.next() {
            Tx::WriteRead(a, out, data) => {
                assert_eq!((a, out.as_slice()), (address, bytes));
                buffer.copy_from_slice(&data);
                Ok(())
            }
            other => panic!("expected {other:?}, got write_read to {address:#04x}"),
        }
    }
}
