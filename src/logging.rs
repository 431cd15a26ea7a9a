// SPDX-License-Identifier: GPL-3.0-or-later

//! A ready-to-use terminal logger, built the way the teacher's `ii-logging`
//! facade assembles one: a compact terminal decorator feeding an async
//! drain, so a logging call never blocks the thread that issued it (a
//! worker thread mid-job, in this crate's case). Callers that want a
//! different sink (structured JSON, a file, a null drain for tests) build
//! their own `slog::Logger` and pass it to [`crate::system::System::new`]
//! directly — this helper only covers the common case.

use slog::{Drain, Logger};

/// An async, terminal-backed logger suitable for a standalone binary
/// embedding this crate.
pub fn terminal_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, slog::o!("component" => "hrcls"))
}
