//! IO port interface.
use std::{
    collections::VecDeque,
    io::{self, BufRead, Write},
};

/// Hooks connecting the virtual machine to the outside world.
///
/// `read` statements pull whitespace-separated integers through `read_int`;
/// `write` statements push results through `write_int`. The machine treats
/// any error from the port as fatal.
pub trait IoPort {
    /// Consume the next integer token from the input.
    fn read_int(&mut self) -> io::Result<i64>;

    /// Emit one integer to the output.
    fn write_int(&mut self, value: i64) -> io::Result<()>;
}

/// Line-oriented port over the process stdin/stdout.
///
/// Input lines are split on whitespace and consumed one token per
/// `read_int` call; each written integer lands on its own line.
#[derive(Default)]
pub struct StdIo {
    pending: VecDeque<String>,
}

impl StdIo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IoPort for StdIo {
    fn read_int(&mut self) -> io::Result<i64> {
        while self.pending.is_empty() {
            let mut line = String::new();
            if io::stdin().lock().read_line(&mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "input exhausted",
                ));
            }
            self.pending
                .extend(line.split_whitespace().map(str::to_owned));
        }

        let token = self.pending.pop_front().unwrap_or_default();
        token.parse::<i64>().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed input '{}', expected an integer", token),
            )
        })
    }

    fn write_int(&mut self, value: i64) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{}", value)
    }
}

/// In-memory port with queued inputs and captured outputs.
///
/// Used by embedders and tests to run programs without touching the
/// process streams.
#[derive(Debug, Default)]
pub struct MemoryIo {
    inputs: VecDeque<i64>,
    outputs: Vec<i64>,
}

impl MemoryIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Port primed with the given input queue.
    pub fn with_inputs(inputs: impl IntoIterator<Item = i64>) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
            outputs: vec![],
        }
    }

    /// Everything the program has written, in order.
    pub fn outputs(&self) -> &[i64] {
        &self.outputs
    }
}

impl IoPort for MemoryIo {
    fn read_int(&mut self) -> io::Result<i64> {
        self.inputs
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "input exhausted"))
    }

    fn write_int(&mut self, value: i64) -> io::Result<()> {
        self.outputs.push(value);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_memory_io_roundtrip() {
        let mut port = MemoryIo::with_inputs([7, -3]);
        assert_eq!(port.read_int().unwrap(), 7);
        assert_eq!(port.read_int().unwrap(), -3);
        assert!(port.read_int().is_err());

        port.write_int(12).unwrap();
        port.write_int(120).unwrap();
        assert_eq!(port.outputs(), &[12, 120]);
    }
}
