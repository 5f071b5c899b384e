use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    thread,
    time::{Duration, Instant},
};

use dotboy_core::{
    Host, InputState,
    host::FRAME_BYTES,
    ppu::{SCREEN_HEIGHT, SCREEN_WIDTH},
};
use log::info;

/// Result a test ROM printed over the serial port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialOutcome {
    Passed,
    Failed,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Limits {
    pub frames: Option<u64>,
    pub time: Option<Duration>,
}

/// Frontend without a window: no buttons are ever pressed, frames are kept
/// for an optional screenshot and serial output can be mirrored to stdout.
pub struct HeadlessHost {
    start: Instant,
    limits: Limits,
    frames: u64,
    last_frame: Vec<u8>,
    echo_serial: bool,
    stop_on_result: bool,
    serial: Vec<u8>,
    checked_up_to: usize,
    outcome: Option<SerialOutcome>,
}

impl HeadlessHost {
    pub fn new(limits: Limits, echo_serial: bool, stop_on_result: bool) -> Self {
        Self {
            start: Instant::now(),
            limits,
            frames: 0,
            last_frame: vec![0xFF; FRAME_BYTES],
            echo_serial,
            stop_on_result,
            serial: Vec::new(),
            checked_up_to: 0,
            outcome: None,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn outcome(&self) -> Option<SerialOutcome> {
        self.outcome
    }

    pub fn last_frame(&self) -> &[u8] {
        &self.last_frame
    }

    fn limit_reached(&self) -> bool {
        if let Some(max) = self.limits.frames
            && self.frames >= max
        {
            info!("Frame limit of {max} reached");
            return true;
        }
        if let Some(limit) = self.limits.time
            && self.start.elapsed() >= limit
        {
            info!("Time limit of {}s reached", limit.as_secs());
            return true;
        }
        false
    }

    fn scan_serial(&mut self) {
        const PASSED: &[u8] = b"Passed";
        const FAILED: &[u8] = b"Failed";

        let start = self
            .checked_up_to
            .saturating_sub(PASSED.len() - 1)
            .min(self.serial.len());
        let window = &self.serial[start..];
        if window.windows(PASSED.len()).any(|chunk| chunk == PASSED) {
            self.outcome = Some(SerialOutcome::Passed);
        } else if window.windows(FAILED.len()).any(|chunk| chunk == FAILED) {
            self.outcome = Some(SerialOutcome::Failed);
        }
        self.checked_up_to = self.serial.len();
    }
}

impl Host for HeadlessHost {
    fn poll_input(&mut self) -> InputState {
        if self.limit_reached() || (self.stop_on_result && self.outcome.is_some()) {
            InputState::quit()
        } else {
            InputState::default()
        }
    }

    fn ticks_ms(&mut self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn delay_ms(&mut self, ms: u64) {
        thread::sleep(Duration::from_millis(ms));
    }

    fn frame_ready(&mut self, frame: &[u8]) {
        self.last_frame.copy_from_slice(frame);
        self.frames += 1;
    }

    fn serial_byte(&mut self, byte: u8) {
        if self.echo_serial {
            let mut out = std::io::stdout().lock();
            let _ = if byte.is_ascii_graphic() || byte == b' ' || byte == b'\n' {
                out.write_all(&[byte])
            } else {
                write!(out, "\\x{byte:02X}")
            };
            let _ = out.flush();
        }
        self.serial.push(byte);
        if self.outcome.is_none() {
            self.scan_serial();
        }
    }
}

/// Write an RGBA frame as a PNG image.
pub fn save_png(path: &Path, frame: &[u8]) -> Result<(), png::EncodingError> {
    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(
        BufWriter::new(file),
        SCREEN_WIDTH as u32,
        SCREEN_HEIGHT as u32,
    );
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(frame)?;
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(host: &mut HeadlessHost, text: &[u8]) {
        for &b in text {
            host.serial_byte(b);
        }
    }

    #[test]
    fn detects_result_split_across_bytes() {
        let mut host = HeadlessHost::new(Limits::default(), false, true);
        feed(&mut host, b"cpu_instrs\n\n01:ok  02:ok\n\nPass");
        assert_eq!(host.outcome(), None);
        assert_eq!(host.poll_input(), InputState::default());
        feed(&mut host, b"ed all tests\n");
        assert_eq!(host.outcome(), Some(SerialOutcome::Passed));
        assert!(host.poll_input().quit);
    }

    #[test]
    fn failure_is_reported() {
        let mut host = HeadlessHost::new(Limits::default(), false, false);
        feed(&mut host, b"03:01\nFailed #2\n");
        assert_eq!(host.outcome(), Some(SerialOutcome::Failed));
        assert!(!host.poll_input().quit);
    }

    #[test]
    fn frame_limit_quits() {
        let limits = Limits {
            frames: Some(2),
            time: None,
        };
        let mut host = HeadlessHost::new(limits, false, false);
        let frame = vec![0u8; FRAME_BYTES];
        host.frame_ready(&frame);
        assert!(!host.poll_input().quit);
        host.frame_ready(&frame);
        assert!(host.poll_input().quit);
        assert_eq!(host.frames(), 2);
    }

    #[test]
    fn screenshot_is_a_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        save_png(&path, &vec![0x80; FRAME_BYTES]).unwrap();
        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[..8], b"\x89PNG\r\n\x1a\n");
    }
}
