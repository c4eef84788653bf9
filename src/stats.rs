//! Per-session statistics and the final pretty-printed report, ported
//! from the (filtered-out) `Statistics` type referenced by
//! `Session.cpp` and the `Session::finalize` dump.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Statistics {
    pub start_time: Option<Instant>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_duration: Option<Duration>,
    pub receive_duration: Option<Duration>,
    pub total_duration: Option<Duration>,
}

impl Default for Statistics {
    fn default() -> Self {
        Statistics {
            start_time: None,
            bytes_sent: 0,
            bytes_received: 0,
            send_duration: None,
            receive_duration: None,
            total_duration: None,
        }
    }
}

impl Statistics {
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    pub fn mark_send_complete(&mut self, bytes_sent: u64) {
        self.bytes_sent = bytes_sent;
        self.send_duration = self.elapsed();
    }

    pub fn mark_receive_complete(&mut self, bytes_received: u64) {
        self.bytes_received = bytes_received;
        self.receive_duration = self.elapsed();
    }

    pub fn mark_finished(&mut self) {
        self.total_duration = self.elapsed();
    }

    fn elapsed(&self) -> Option<Duration> {
        self.start_time.map(|t| t.elapsed())
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "bytes_sent: {}", self.bytes_sent)?;
        writeln!(f, "bytes_received: {}", self.bytes_received)?;
        match self.send_duration {
            Some(d) => writeln!(f, "send_duration: {}", humantime::format_duration(d))?,
            None => writeln!(f, "send_duration: n/a")?,
        }
        match self.receive_duration {
            Some(d) => writeln!(f, "receive_duration: {}", humantime::format_duration(d))?,
            None => writeln!(f, "receive_duration: n/a")?,
        }
        match self.total_duration {
            Some(d) => writeln!(f, "total_duration: {}", humantime::format_duration(d))?,
            None => writeln!(f, "total_duration: n/a")?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_statistics_prints_n_a_durations() {
        let s = Statistics::default();
        let out = s.to_string();
        assert!(out.contains("send_duration: n/a"));
        assert!(out.contains("bytes_sent: 0"));
    }
}
