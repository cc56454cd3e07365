//! Human-readable rendering of metric values.

use crate::error::FormatError;
use crate::process::{FieldFormatter, FieldValue};
use humansize::{format_size, BINARY, DECIMAL};
use std::sync::Arc;

const ELLIPSIS: char = '…';
const ELIDED_SEGMENT: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatConfig {
    pub shorten_len: usize,
    pub percent_decimals: usize,
    pub use_binary_units: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            shorten_len: 24,
            percent_decimals: 1,
            use_binary_units: true,
        }
    }
}

pub trait Formatter {
    fn format_bytes(&self, value: u64) -> String;

    /// Percentage clamped to `0..=100`.
    fn format_percent(&self, value: f64) -> String;

    fn format_freq(&self, mhz: f64) -> String;

    fn shorten_path(&self, path: &str, max_len: usize) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct SimpleFormatter {
    config: FormatConfig,
}

impl SimpleFormatter {
    pub fn new(config: FormatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    /// Shorten to the configured default length.
    pub fn shorten(&self, path: &str) -> String {
        self.shorten_path(path, self.config.shorten_len)
    }
}

impl Formatter for SimpleFormatter {
    fn format_bytes(&self, value: u64) -> String {
        let units = if self.config.use_binary_units {
            BINARY
        } else {
            DECIMAL
        };
        format_size(value, units.decimal_places(1).decimal_zeroes(1))
    }

    fn format_percent(&self, value: f64) -> String {
        let value = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 100.0)
        };
        format!("{:.*}%", self.config.percent_decimals, value)
    }

    fn format_freq(&self, mhz: f64) -> String {
        if mhz.abs() < 1000.0 {
            format!("{:.2} MHz", mhz)
        } else {
            format!("{:.2} GHz", mhz / 1000.0)
        }
    }

    fn shorten_path(&self, path: &str, max_len: usize) -> String {
        shorten_path(path, max_len)
    }
}

/// Shorten `path` to at most `max_len` characters.
///
/// Tries, in order: the path as is, the first two and last two segments
/// around `...`, `.../filename` (squeezing the filename if needed), and
/// finally a plain head…tail cut. The root, `~`, drive letter or UNC share
/// is kept as a prefix and the original separator style is preserved.
pub fn shorten_path(path: &str, max_len: usize) -> String {
    if max_len == 0 {
        return String::new();
    }
    if char_len(path) <= max_len {
        return path.to_string();
    }

    let sep = if path.contains('\\') && !path.contains('/') {
        '\\'
    } else {
        '/'
    };
    let norm = path.replace('\\', "/");
    let (prefix, rest) = split_prefix(&norm);
    let parts: Vec<&str> = rest.split('/').filter(|p| !p.is_empty()).collect();

    let full = reassemble(&prefix, &parts, sep);
    if char_len(&full) <= max_len {
        return full;
    }

    if parts.len() >= 4 {
        let mut segments: Vec<&str> = parts[..2].to_vec();
        segments.push(ELIDED_SEGMENT);
        segments.extend_from_slice(&parts[parts.len() - 2..]);
        let candidate = reassemble(&prefix, &segments, sep);
        if char_len(&candidate) <= max_len {
            return candidate;
        }

        let filename = parts[parts.len() - 1];
        let candidate = reassemble(&prefix, &[ELIDED_SEGMENT, filename], sep);
        if char_len(&candidate) <= max_len {
            return candidate;
        }

        let name_len = char_len(filename);
        if name_len > 6 && max_len > char_len(&prefix) + 5 {
            // Everything around the squeezed name, plus the ellipsis itself
            let overhead = char_len(&reassemble(&prefix, &[ELIDED_SEGMENT, ""], sep)) + 1;
            let keep = max_len.saturating_sub(overhead).max(3);
            if keep < name_len {
                let squeezed = squeeze(filename, keep);
                let candidate = reassemble(&prefix, &[ELIDED_SEGMENT, squeezed.as_str()], sep);
                if char_len(&candidate) <= max_len {
                    return candidate;
                }
            }
        }
    }

    if max_len <= 2 {
        return ELLIPSIS.to_string();
    }
    squeeze(&full, max_len - 1)
}

/// Split off the root, home, drive or UNC share prefix.
fn split_prefix(norm: &str) -> (String, &str) {
    if norm.starts_with("//") {
        let parts: Vec<&str> = norm.split('/').collect();
        if parts.len() > 4 {
            let prefix = format!("//{}/{}", parts[2], parts[3]);
            let skip = prefix.len();
            return (prefix, &norm[skip..]);
        }
        return (String::new(), norm);
    }

    let mut chars = norm.chars();
    if let (Some(drive), Some(':')) = (chars.next(), chars.next()) {
        if drive.is_ascii_alphabetic() {
            return (norm[..2].to_string(), &norm[2..]);
        }
    }

    if let Some(rest) = norm.strip_prefix('/') {
        return ("/".to_string(), rest);
    }
    if let Some(rest) = norm.strip_prefix("~/") {
        return ("~".to_string(), rest);
    }
    (String::new(), norm)
}

fn reassemble(prefix: &str, segments: &[&str], sep: char) -> String {
    let joined = segments.join("/");
    let out = match prefix {
        "" => joined,
        "/" => format!("/{}", joined),
        _ if segments.is_empty() => prefix.to_string(),
        _ => format!("{}/{}", prefix, joined),
    };
    if sep == '/' {
        out
    } else {
        out.replace('/', &sep.to_string())
    }
}

/// Keep `keep` characters of `s`, split between head and tail around `…`.
fn squeeze(s: &str, keep: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    let left = (keep / 2).max(1);
    let right = keep.saturating_sub(left).max(1);
    if left + right >= chars.len() {
        return s.to_string();
    }

    let mut out: String = chars[..left].iter().collect();
    out.push(ELLIPSIS);
    out.extend(&chars[chars.len() - right..]);
    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Field formatter rendering a byte count.
pub fn bytes_field<F: Formatter + Send + Sync + 'static>(formatter: Arc<F>) -> FieldFormatter {
    Arc::new(move |value: &FieldValue| match value {
        FieldValue::Int(bytes) if *bytes >= 0 => {
            Ok(FieldValue::Text(formatter.format_bytes(*bytes as u64)))
        }
        other => Err(FormatError::new("bytes", format!("not a byte count: {:?}", other))),
    })
}

/// Field formatter rendering a percentage.
pub fn percent_field<F: Formatter + Send + Sync + 'static>(formatter: Arc<F>) -> FieldFormatter {
    Arc::new(move |value: &FieldValue| {
        value
            .as_f64()
            .map(|v| FieldValue::Text(formatter.format_percent(v)))
            .ok_or_else(|| FormatError::new("percent", format!("not a number: {:?}", value)))
    })
}

/// Field formatter shortening a path to `max_len` characters.
pub fn path_field<F: Formatter + Send + Sync + 'static>(
    formatter: Arc<F>,
    max_len: usize,
) -> FieldFormatter {
    Arc::new(move |value: &FieldValue| {
        value
            .as_str()
            .map(|p| FieldValue::Text(formatter.shorten_path(p, max_len)))
            .ok_or_else(|| FormatError::new("path", format!("not a path: {:?}", value)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter() -> SimpleFormatter {
        SimpleFormatter::default()
    }

    #[test]
    fn test_format_bytes_units() {
        assert_eq!(formatter().format_bytes(1536), "1.5 KiB");

        let decimal = SimpleFormatter::new(FormatConfig {
            use_binary_units: false,
            ..Default::default()
        });
        assert_eq!(decimal.format_bytes(1500), "1.5 kB");
    }

    #[test]
    fn test_format_percent_clamps() {
        let f = formatter();
        assert_eq!(f.format_percent(57.34), "57.3%");
        assert_eq!(f.format_percent(120.0), "100.0%");
        assert_eq!(f.format_percent(-3.0), "0.0%");
        assert_eq!(f.format_percent(f64::NAN), "0.0%");

        let precise = SimpleFormatter::new(FormatConfig {
            percent_decimals: 2,
            ..Default::default()
        });
        assert_eq!(precise.format_percent(12.345_6), "12.35%");
    }

    #[test]
    fn test_format_freq() {
        assert_eq!(formatter().format_freq(800.0), "800.00 MHz");
        assert_eq!(formatter().format_freq(2400.0), "2.40 GHz");
    }

    #[test]
    fn test_short_paths_are_untouched() {
        assert_eq!(shorten_path("/etc/hosts", 24), "/etc/hosts");
        assert_eq!(shorten_path("/etc/hosts", 0), "");
    }

    #[test]
    fn test_shorten_keeps_head_and_tail_segments() {
        assert_eq!(
            shorten_path("/usr/local/lib/python3/site-packages/foo.py", 36),
            "/usr/local/.../site-packages/foo.py"
        );
    }

    #[test]
    fn test_shorten_windows_path_keeps_drive_and_separator() {
        assert_eq!(
            shorten_path(r"C:\Users\alice\AppData\Local\Temp\file.txt", 30),
            r"C:\...\file.txt"
        );
    }

    #[test]
    fn test_shorten_unc_share() {
        assert_eq!(
            shorten_path("//server/share/a/b/c/d/report.pdf", 30),
            "//server/share/.../report.pdf"
        );
    }

    #[test]
    fn test_shorten_squeezes_long_filename() {
        let shortened = shorten_path("/a/b/c/d/an_extremely_long_file_name.tar.gz", 20);
        assert!(char_len(&shortened) <= 20, "{}", shortened);
        assert!(shortened.starts_with("/.../"));
        assert!(shortened.contains(ELLIPSIS));
    }

    #[test]
    fn test_shorten_falls_back_to_character_squeeze() {
        assert_eq!(shorten_path("abcdefghij", 5), "ab…ij");
        assert_eq!(shorten_path("abcdefghij", 1), "…");
    }

    #[test]
    fn test_field_formatters() {
        let f = Arc::new(formatter());
        let bytes = bytes_field(Arc::clone(&f));
        assert_eq!(bytes(&FieldValue::Int(2048)).unwrap(), FieldValue::Text("2.0 KiB".into()));
        assert!(bytes(&FieldValue::Unavailable).is_err());

        let percent = percent_field(f);
        assert_eq!(percent(&FieldValue::Float(12.0)).unwrap(), FieldValue::Text("12.0%".into()));
        assert!(percent(&FieldValue::Text("x".into())).is_err());
    }
}
