//! 콘솔 리포터 포트 구현 어댑터.

use std::io::{self, IsTerminal};

use crate::application::ports::Reporter;

/// 콘솔 전용 리포터 어댑터.
pub struct ConsoleReporter {
    interactive: bool,
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleReporter {
    /// stdout이 TTY일 때만 상태 색상을 입힌다.
    pub fn new() -> Self {
        Self {
            interactive: io::stdout().is_terminal(),
        }
    }

    fn colorize_status(&self, status: &str) -> String {
        if !self.interactive {
            return status.to_string();
        }
        match status {
            "running" => format!("\x1b[33m{status}\x1b[0m"),
            "cached" | "done" => format!("\x1b[32m{status}\x1b[0m"),
            "skipped" => format!("\x1b[90m{status}\x1b[0m"),
            "error" => format!("\x1b[31m{status}\x1b[0m"),
            _ => status.to_string(),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, name: &str) {
        println!();
        println!("==================== {} ====================", name);
    }

    fn kv(&self, key: &str, value: &str) {
        println!("{:<12}: {}", key, value);
    }

    fn status(&self, scope: &str, message: &str) {
        println!("[{:<12}] {}", scope, message);
    }

    fn phase_status(&self, phase: &str, status: &str, extra: Option<&str>) {
        let status = self.colorize_status(status);
        match extra {
            Some(extra) => println!("[phase:{:<8}] {:<7} {}", phase, status, extra),
            None => println!("[phase:{:<8}] {}", phase, status),
        }
    }

    fn raw(&self, line: &str) {
        println!("{}", line);
    }
}
