use indicatif::{ProgressBar, ProgressStyle};

/// Progress template handed to the engine; every status line comes back as
/// one machine-readable record on stdout.
pub const ENGINE_PROGRESS_TEMPLATE: &str = "download:%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress._speed_str)s|%(progress._eta_str)s";

const RECORD_PREFIX: &str = "download:";
const RECORD_FIELDS: usize = 6;

/// One status event reported by the download engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Downloading {
        downloaded: u64,
        total: Option<u64>,
        total_is_estimate: bool,
        speed: Option<String>,
        eta: Option<String>,
    },
    Finished,
}

/// Parses one engine stdout line. Lines that are not progress records are
/// ignored by returning `None`.
pub fn parse_event(line: &str) -> Option<ProgressEvent> {
    let record = line.trim().strip_prefix(RECORD_PREFIX)?;
    let mut fields = record.splitn(RECORD_FIELDS, '|');

    match fields.next()? {
        "finished" => Some(ProgressEvent::Finished),
        "downloading" => {
            let downloaded = parse_bytes(fields.next().unwrap_or("NA")).unwrap_or(0);
            let exact = parse_bytes(fields.next().unwrap_or("NA"));
            let estimate = parse_bytes(fields.next().unwrap_or("NA"));
            let speed = non_empty(fields.next().unwrap_or(""));
            let eta = non_empty(fields.next().unwrap_or(""));

            let (total, total_is_estimate) = match (exact, estimate) {
                (Some(t), _) => (Some(t), false),
                (None, Some(t)) => (Some(t), true),
                (None, None) => (None, false),
            };

            Some(ProgressEvent::Downloading {
                downloaded,
                total,
                total_is_estimate,
                speed,
                eta,
            })
        }
        _ => None,
    }
}

fn parse_bytes(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u64>() {
        return Some(n);
    }

    // The engine occasionally reports fractional byte counts.
    raw.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64)
}

fn non_empty(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "NA" || raw == "N/A" {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Adapts engine progress events onto a single terminal progress bar.
///
/// The total is updated opportunistically: an exact byte count always wins
/// over an estimate, and once an exact total is seen estimates are ignored.
pub struct ProgressRenderer {
    bar: ProgressBar,
    has_exact_total: bool,
}

impl ProgressRenderer {
    pub fn new(label: String) -> Self {
        let bar = ProgressBar::no_length();
        bar.set_style(
            ProgressStyle::with_template(
                "{prefix} {spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
            )
            .expect("progress template is valid")
            .progress_chars("━━╌"),
        );
        bar.set_prefix(label);

        Self {
            bar,
            has_exact_total: false,
        }
    }

    pub fn observe(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Downloading {
                downloaded,
                total,
                total_is_estimate,
                speed,
                eta,
            } => {
                if let Some(total) = total {
                    if !*total_is_estimate {
                        self.has_exact_total = true;
                        self.bar.set_length(*total);
                    } else if !self.has_exact_total {
                        self.bar.set_length(*total);
                    }
                }

                self.bar.set_position(*downloaded);

                let mut msg = String::new();
                if let Some(speed) = speed {
                    msg.push_str(speed);
                }
                if let Some(eta) = eta {
                    if !msg.is_empty() {
                        msg.push(' ');
                    }
                    msg.push_str("ETA ");
                    msg.push_str(eta);
                }
                self.bar.set_message(msg);
            }

            ProgressEvent::Finished => {
                if let Some(len) = self.bar.length() {
                    self.bar.set_position(len);
                }
                self.bar.finish();
            }
        }
    }

    /// Closes the display, pinning it to 100% when a total is known.
    pub fn finish(&self) {
        if let Some(len) = self.bar.length() {
            self.bar.set_position(len);
        }
        self.bar.finish();
    }

    /// Removes the display entirely (failed attempt).
    pub fn clear(&self) {
        self.bar.finish_and_clear();
    }

    #[cfg(test)]
    fn position(&self) -> u64 {
        self.bar.position()
    }

    #[cfg(test)]
    fn total(&self) -> Option<u64> {
        self.bar.length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_downloading_record() {
        let event = parse_event("download:downloading|1024|2048|NA|  1.00MiB/s|00:05");

        assert_eq!(
            event,
            Some(ProgressEvent::Downloading {
                downloaded: 1024,
                total: Some(2048),
                total_is_estimate: false,
                speed: Some("1.00MiB/s".to_string()),
                eta: Some("00:05".to_string()),
            })
        );
    }

    #[test]
    fn falls_back_to_the_estimated_total() {
        let event = parse_event("download:downloading|10|NA|4096|NA|NA");

        assert_eq!(
            event,
            Some(ProgressEvent::Downloading {
                downloaded: 10,
                total: Some(4096),
                total_is_estimate: true,
                speed: None,
                eta: None,
            })
        );
    }

    #[test]
    fn recognizes_finished_records() {
        assert_eq!(
            parse_event("download:finished|2048|2048|NA|NA|00:00"),
            Some(ProgressEvent::Finished)
        );
        assert_eq!(parse_event("download:finished"), Some(ProgressEvent::Finished));
    }

    #[test]
    fn ignores_unrelated_engine_output() {
        assert_eq!(parse_event("[youtube] abc: Downloading webpage"), None);
        assert_eq!(parse_event(""), None);
        assert_eq!(parse_event("download:postprocessing|1|2|3|4|5"), None);
    }

    #[test]
    fn renderer_prefers_exact_totals_over_estimates() {
        let mut renderer = ProgressRenderer::new("test".to_string());

        renderer.observe(&ProgressEvent::Downloading {
            downloaded: 1,
            total: Some(100),
            total_is_estimate: true,
            speed: None,
            eta: None,
        });
        assert_eq!(renderer.total(), Some(100));

        renderer.observe(&ProgressEvent::Downloading {
            downloaded: 2,
            total: Some(200),
            total_is_estimate: false,
            speed: None,
            eta: None,
        });
        assert_eq!(renderer.total(), Some(200));

        // A later estimate must not clobber the exact total.
        renderer.observe(&ProgressEvent::Downloading {
            downloaded: 3,
            total: Some(300),
            total_is_estimate: true,
            speed: None,
            eta: None,
        });
        assert_eq!(renderer.total(), Some(200));
        assert_eq!(renderer.position(), 3);
    }

    #[test]
    fn finished_pins_the_bar_to_its_total() {
        let mut renderer = ProgressRenderer::new("test".to_string());

        renderer.observe(&ProgressEvent::Downloading {
            downloaded: 10,
            total: Some(50),
            total_is_estimate: false,
            speed: None,
            eta: None,
        });
        renderer.observe(&ProgressEvent::Finished);

        assert_eq!(renderer.position(), 50);
    }
}
