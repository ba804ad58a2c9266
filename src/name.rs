//! Decoding of instrument metadata embedded in read names
//!
//! Read names are 14 characters of base-36: a six character run timestamp, a one
//! character hash, a two digit region number and a trailing XY coordinate.

/// Minimum name length for the timestamp to be decoded
const MIN_TIMESTAMP: usize = 6;

/// Minimum name length for the region and XY coordinate to be decoded
const MIN_LOCATION: usize = 9;

/// Secondary fields derived from a read name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameInfo {
    /// Run timestamp as `Y_M_D_h_m_s`
    pub timestamp: Option<String>,
    /// Two character region code
    pub region: Option<String>,
    /// Well coordinate as `X_Y`
    pub xy: Option<String>,
}
impl NameInfo {
    /// Decodes the timestamp, region and XY location from a read name
    ///
    /// Fields are only decoded when the name is long enough to hold them; shorter names
    /// leave them as `None`.
    #[must_use]
    pub fn decode(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut info = Self::default();

        if bytes.len() >= MIN_TIMESTAMP {
            let mut n = base36(&bytes[..MIN_TIMESTAMP]);
            let sec = n % 60;
            n /= 60;
            let min = n % 60;
            n /= 60;
            let hour = n % 24;
            n /= 24;
            let day = n % 32;
            n /= 32;
            let month = n % 13;
            let year = 2000 + n / 13;
            info.timestamp = Some(format!("{year}_{month}_{day}_{hour}_{min}_{sec}"));
        }

        if bytes.len() >= MIN_LOCATION {
            info.region = Some(String::from_utf8_lossy(&bytes[7..9]).into_owned());
            let location = base36(&bytes[9..]);
            info.xy = Some(format!("{}_{}", location >> 12, location & 4095));
        }

        info
    }

    /// The XY coordinate, or an empty string when the name is too short
    #[must_use]
    pub fn xy(&self) -> &str {
        self.xy.as_deref().unwrap_or_default()
    }
}

/// Decodes base-36 digits where `A..Z` map to 0..25 and `0..9` map to 26..35
///
/// Unknown characters count as zero and overflow wraps, matching instrument software.
#[must_use]
pub fn base36(digits: &[u8]) -> u32 {
    digits.iter().fold(0u32, |acc, &c| {
        let value = match c {
            b'A'..=b'Z' => u32::from(c - b'A'),
            b'0'..=b'9' => u32::from(c - b'0') + 26,
            _ => 0,
        };
        acc.wrapping_mul(36).wrapping_add(value)
    })
}
