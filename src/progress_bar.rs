//! Window timing and progress reporting.
//!
//! [`WindowProgress`] measures each generated window of a consolidation run and
//! the mean over the windows done so far. With the `progress` feature it also
//! drives an `indicatif` bar. [`fmt_dur`] renders the durations for logs.
use std::time::{Duration, Instant};

/// Human-readable duration: `"253µs"`, `"42ms"`, `"3.14s"`.
pub fn fmt_dur(d: Duration) -> String {
    match d.as_micros() {
        us if us < 1_000 => format!("{us}µs"),
        us if us < 1_000_000 => format!("{}ms", us / 1_000),
        _ => format!("{:.2}s", d.as_secs_f32()),
    }
}

/// Progress over the windows of one run.
pub struct WindowProgress {
    started: Instant,
    window_start: Instant,
    done: u32,
    #[cfg(feature = "progress")]
    bar: indicatif::ProgressBar,
}

impl WindowProgress {
    pub fn new(total: usize) -> Self {
        #[cfg(feature = "progress")]
        let bar = {
            use indicatif::{ProgressBar, ProgressStyle};

            let bar = ProgressBar::new((total as u64).max(1));
            if let Ok(style) =
                ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} | ETA {eta} | {msg}")
            {
                bar.set_style(style);
            }
            bar
        };
        #[cfg(not(feature = "progress"))]
        let _ = total;

        let now = Instant::now();
        WindowProgress {
            started: now,
            window_start: now,
            done: 0,
            #[cfg(feature = "progress")]
            bar,
        }
    }

    /// Close the current window; return its duration and the mean window duration.
    pub fn window_done(&mut self) -> (Duration, Duration) {
        let now = Instant::now();
        let last = now.duration_since(self.window_start);
        self.window_start = now;
        self.done += 1;
        let mean = now.duration_since(self.started) / self.done;
        #[cfg(feature = "progress")]
        {
            self.bar
                .set_message(format!("last: {}, mean: {}", fmt_dur(last), fmt_dur(mean)));
            self.bar.inc(1);
        }
        (last, mean)
    }

    pub fn finish(&self) {
        #[cfg(feature = "progress")]
        self.bar.finish_and_clear();
    }
}
